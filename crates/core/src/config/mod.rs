use serde::Deserialize;

use crate::error::{CoreError, Result};

/// Development-only signing key. Refused outright when the deployment
/// environment is `production`.
pub const DEV_JWT_SECRET: &str = "siteledger-dev-secret-do-not-use-in-prod";

const MIN_JWT_SECRET_BYTES: usize = 32;
const MIN_JWT_EXPIRY_SECS: i64 = 60;
const MAX_JWT_EXPIRY_SECS: i64 = 30 * 24 * 3600;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres connection string
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Deployment environment: `development`, `staging` or `production`
    /// (env: `ENVIRONMENT`).
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Server bind host (env: `API_HOST`).
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Server bind port (env: `API_PORT`).
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Symmetric token signing key (env: `JWT_SECRET`). Minimum 32 bytes.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    /// Token issuer claim (env: `JWT_ISSUER`).
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    /// Token audience claim (env: `JWT_AUDIENCE`).
    #[serde(default = "default_jwt_audience")]
    pub jwt_audience: String,

    /// Token lifetime in seconds (env: `JWT_EXPIRY_SECS`).
    /// Must fall within [1 minute, 30 days].
    #[serde(default = "default_jwt_expiry_secs")]
    pub jwt_expiry_secs: i64,

    /// Bind the tenant session variable on every request connection so the
    /// row-visibility policies participate in isolation (env: `RLS_ENABLED`).
    #[serde(default = "default_rls_enabled")]
    pub rls_enabled: bool,

    /// Expose Prometheus text exposition on `/metrics` (env: `METRICS_ENABLED`).
    #[serde(default)]
    pub metrics_enabled: bool,

    /// Serve Swagger UI and the OpenAPI document (env: `DOCS_ENABLED`).
    #[serde(default)]
    pub docs_enabled: bool,

    /// Allow cross-origin requests (env: `ENABLE_CORS`).
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Maximum number of connections in the pool (env: `DB_MAX_CONNECTIONS`).
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    /// Minimum number of idle connections maintained in the pool
    /// (env: `DB_MIN_CONNECTIONS`).
    #[serde(default = "default_min_connections")]
    pub db_min_connections: u32,

    /// Timeout in seconds to wait for a connection from the pool
    /// (env: `DB_CONNECTION_TIMEOUT`).
    #[serde(default = "default_connection_timeout_secs")]
    pub db_connection_timeout_secs: u64,

    /// Idle connection timeout in seconds before it is closed
    /// (env: `DB_IDLE_TIMEOUT`).
    #[serde(default = "default_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Maximum lifetime of a pooled connection in seconds
    /// (env: `DB_MAX_LIFETIME`).
    #[serde(default = "default_max_lifetime_secs")]
    pub db_max_lifetime_secs: u64,
}

fn default_database_url() -> String {
    "postgres://localhost/siteledger".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    3000
}

fn default_jwt_secret() -> String {
    DEV_JWT_SECRET.to_string()
}

fn default_jwt_issuer() -> String {
    "siteledger".to_string()
}

fn default_jwt_audience() -> String {
    "siteledger-api".to_string()
}

fn default_jwt_expiry_secs() -> i64 {
    86_400
}

fn default_rls_enabled() -> bool {
    true
}

fn default_enable_cors() -> bool {
    true
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_connection_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_max_lifetime_secs() -> u64 {
    1800
}

impl AppConfig {
    /// Load configuration from environment variables and validate it.
    /// A failure here is fatal: the process must refuse to start.
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;
        let cfg: AppConfig = cfg.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Convenience constructor from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::load()
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Reject configurations that would weaken token security.
    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(CoreError::InvalidConfig {
                field: "jwt_secret".to_string(),
                reason: format!("must be at least {} bytes", MIN_JWT_SECRET_BYTES),
            });
        }
        if self.is_production() && self.jwt_secret == DEV_JWT_SECRET {
            return Err(CoreError::InvalidConfig {
                field: "jwt_secret".to_string(),
                reason: "default development key is not allowed in production".to_string(),
            });
        }
        if !(MIN_JWT_EXPIRY_SECS..=MAX_JWT_EXPIRY_SECS).contains(&self.jwt_expiry_secs) {
            return Err(CoreError::InvalidConfig {
                field: "jwt_expiry_secs".to_string(),
                reason: "must be between 1 minute and 30 days".to_string(),
            });
        }
        if self.jwt_issuer.trim().is_empty() {
            return Err(CoreError::InvalidConfig {
                field: "jwt_issuer".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.jwt_audience.trim().is_empty() {
            return Err(CoreError::InvalidConfig {
                field: "jwt_audience".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            environment: default_environment(),
            api_host: default_api_host(),
            api_port: default_api_port(),
            jwt_secret: default_jwt_secret(),
            jwt_issuer: default_jwt_issuer(),
            jwt_audience: default_jwt_audience(),
            jwt_expiry_secs: default_jwt_expiry_secs(),
            rls_enabled: default_rls_enabled(),
            metrics_enabled: false,
            docs_enabled: false,
            enable_cors: default_enable_cors(),
            db_max_connections: default_max_connections(),
            db_min_connections: default_min_connections(),
            db_connection_timeout_secs: default_connection_timeout_secs(),
            db_idle_timeout_secs: default_idle_timeout_secs(),
            db_max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(!cfg.is_production());
    }

    #[test]
    fn test_short_secret_rejected() {
        let cfg = AppConfig {
            jwt_secret: "too-short".to_string(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_default_secret_rejected_in_production() {
        let cfg = AppConfig {
            environment: "production".to_string(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = AppConfig {
            environment: "production".to_string(),
            jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_expiry_bounds() {
        let too_short = AppConfig {
            jwt_expiry_secs: 59,
            ..AppConfig::default()
        };
        assert!(too_short.validate().is_err());

        let too_long = AppConfig {
            jwt_expiry_secs: 31 * 24 * 3600,
            ..AppConfig::default()
        };
        assert!(too_long.validate().is_err());

        let thirty_minutes = AppConfig {
            jwt_expiry_secs: 1800,
            ..AppConfig::default()
        };
        assert!(thirty_minutes.validate().is_ok());
    }
}
