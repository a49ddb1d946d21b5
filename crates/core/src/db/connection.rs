//! Database connection management

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::db::tenant::TenantSession;
use crate::error::{CoreError, Result};

/// Database connection pool
///
/// Connections are checked out for the life of a request via
/// [`Database::tenant_session`] and returned on all exit paths; the
/// `after_release` hook clears the tenant variable so a value set for one
/// request can never be observed by the next checkout.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    rls_enabled: bool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn new(config: &AppConfig) -> Result<Self> {
        info!("Connecting to database");

        let pool = Self::pool_options(config)
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                error!("Failed to connect to database: {}", e);
                CoreError::Database(e)
            })?;

        info!(
            "Database connection pool established (max_connections={})",
            config.db_max_connections
        );
        Ok(Self {
            pool,
            rls_enabled: config.rls_enabled,
        })
    }

    /// Build a pool without connecting. Connections are established on first
    /// use, which keeps router-level tests independent of a live database.
    pub fn connect_lazy(config: &AppConfig) -> Result<Self> {
        let pool = Self::pool_options(config)
            .connect_lazy(&config.database_url)
            .map_err(CoreError::Database)?;
        Ok(Self {
            pool,
            rls_enabled: config.rls_enabled,
        })
    }

    fn pool_options(config: &AppConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .min_connections(config.db_min_connections)
            .acquire_timeout(Duration::from_secs(config.db_connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime_secs))
            .after_release(|conn, _meta| {
                Box::pin(async move {
                    // Clear the tenant variable before the connection goes
                    // back to the pool. set_config always succeeds, unlike
                    // RESET of a custom parameter that was never set.
                    sqlx::query("select set_config('app.current_org', '', false)")
                        .execute(conn)
                        .await?;
                    Ok(true)
                })
            })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn rls_enabled(&self) -> bool {
        self.rls_enabled
    }

    /// Acquire a dedicated connection bound to the given organization.
    ///
    /// Handlers must run every query of a request on this session so the
    /// tenant variable stays in scope for the row-visibility policies.
    pub async fn tenant_session(&self, org_id: i64) -> Result<TenantSession> {
        TenantSession::acquire(&self.pool, org_id, self.rls_enabled).await
    }

    /// Acquire a session for identity-layer lookups, which happen before any
    /// tenant context exists. Bound to the main tenant so the row policies do
    /// not hide the account being authenticated.
    pub async fn auth_session(&self) -> Result<TenantSession> {
        TenantSession::acquire(&self.pool, crate::MAIN_TENANT_ORG_ID, self.rls_enabled).await
    }

    /// Run database migrations
    ///
    /// Migration files are append-only and applied in lexical order; the DDL
    /// is idempotent so re-running on startup is safe.
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        let migrations: [(&str, &str); 3] = [
            ("0001_init.sql", include_str!("../../migrations/0001_init.sql")),
            ("0002_rls.sql", include_str!("../../migrations/0002_rls.sql")),
            (
                "0003_counters.sql",
                include_str!("../../migrations/0003_counters.sql"),
            ),
        ];

        for (name, sql) in migrations {
            info!("Running migration {}", name);
            sqlx::raw_sql(sql).execute(&self.pool).await.map_err(|e| {
                error!("Migration {} failed: {}", name, e);
                CoreError::Database(e)
            })?;
        }

        info!("Database migrations completed");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("select 1")
            .execute(&self.pool)
            .await
            .map_err(CoreError::from)?;
        Ok(())
    }
}
