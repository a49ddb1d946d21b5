//! API server setup and configuration

use axum::Router;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use siteledger_core::{AppConfig, Database};

use crate::{error::Result, routes, state::AppState};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Serve Swagger UI and the OpenAPI document
    pub enable_docs: bool,
}

impl ServerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            host: config.api_host.clone(),
            port: config.api_port,
            enable_cors: config.enable_cors,
            enable_docs: config.docs_enabled,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            enable_cors: true,
            enable_docs: false,
        }
    }
}

/// API Server
pub struct Server {
    config: ServerConfig,
    app: Router,
}

impl Server {
    /// Create a new API server
    pub fn new(config: ServerConfig, db: Database, app_config: AppConfig) -> Self {
        let state = Arc::new(AppState::new(db, app_config));
        let app = Self::build_app(state, &config);

        Self { config, app }
    }

    /// Build the application router
    fn build_app(state: Arc<AppState>, config: &ServerConfig) -> Router {
        // Docs and metrics routes are wired inside create_router, driven by
        // the flags on the shared state, so every route sits under the same
        // middleware stack.
        let mut app = routes::create_router(state);

        // Add CORS if enabled
        if config.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            app = app.layer(cors);
        }

        app
    }

    /// Start the server
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .expect("Invalid socket address");

        info!("🚀 SiteLedger API server starting on http://{}", addr);
        info!("📦 Assets: http://{}/assets", addr);
        info!("📊 Health check: http://{}/health", addr);
        if self.config.enable_docs {
            info!("📚 API Documentation: http://{}/docs", addr);
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind address");

        axum::serve(listener, self.app).await.expect("Server error");

        Ok(())
    }

    /// Get router for testing
    pub fn router(self) -> Router {
        self.app
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert!(config.enable_cors);
        assert!(!config.enable_docs);
    }

    #[test]
    fn test_server_config_follows_app_config() {
        let app_config = AppConfig {
            api_port: 8080,
            docs_enabled: true,
            ..AppConfig::default()
        };
        let config = ServerConfig::from_app_config(&app_config);
        assert_eq!(config.port, 8080);
        assert!(config.enable_docs);
    }
}
