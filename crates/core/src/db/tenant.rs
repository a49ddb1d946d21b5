//! Tenant-scoped database sessions
//!
//! Isolation rests on two cooperating mechanisms: every store query filters
//! on the context organization, and (when enabled) a per-connection session
//! variable feeds the row-visibility policies installed by the migrations.
//! The variable is bound here, once, on a connection held for the whole
//! request; the pool's `after_release` hook clears it again.

use std::ops::{Deref, DerefMut};

use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres};
use tracing::debug;

use crate::error::Result;

/// A pooled connection bound to one organization for one request.
///
/// Dropping the session returns the connection to the pool on every exit
/// path, normal or not; the tenant variable never outlives the checkout.
pub struct TenantSession {
    conn: PoolConnection<Postgres>,
    org_id: i64,
}

impl TenantSession {
    pub(crate) async fn acquire(pool: &PgPool, org_id: i64, rls_enabled: bool) -> Result<Self> {
        let mut conn = pool.acquire().await?;

        if rls_enabled {
            sqlx::query("select set_config('app.current_org', $1, false)")
                .bind(org_id.to_string())
                .execute(&mut *conn)
                .await?;
            debug!(org_id, "tenant session bound");
        }

        Ok(Self { conn, org_id })
    }

    /// Organization this session is bound to.
    pub fn org_id(&self) -> i64 {
        self.org_id
    }

    /// The underlying connection, for store calls.
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

impl Deref for TenantSession {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for TenantSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
