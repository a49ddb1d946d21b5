//! SiteLedger API Server Binary

use siteledger_api::{telemetry, Server, ServerConfig};
use siteledger_core::{AppConfig, Database};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize structured logging (reads RUST_LOG and LOG_FORMAT env vars)
    telemetry::init();

    info!("Starting SiteLedger API Server");

    // Configuration errors are fatal: the process refuses to start.
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Connecting to database (pool: min={}, max={}, timeout={}s)...",
        config.db_min_connections, config.db_max_connections, config.db_connection_timeout_secs
    );
    let db = match Database::new(&config).await {
        Ok(db) => db,
        Err(e) => {
            error!("❌ Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db.migrate().await {
        error!("❌ Migrations failed: {}", e);
        std::process::exit(1);
    }

    // Create server configuration
    let server_config = ServerConfig::from_app_config(&config);

    // Create and start server
    let server = Server::new(server_config, db, config);

    if let Err(e) = server.start().await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
