//! Shared application state

use std::sync::Arc;

use siteledger_core::auth::TokenManager;
use siteledger_core::{AppConfig, Database};

/// State shared by every handler. Cheap to clone behind the router's `Arc`.
pub struct AppState {
    pub db: Database,
    pub config: Arc<AppConfig>,
    pub tokens: TokenManager,
    pub version: String,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        let tokens = TokenManager::new(&config);
        Self {
            db,
            config: Arc::new(config),
            tokens,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
