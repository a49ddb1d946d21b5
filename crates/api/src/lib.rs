//! SiteLedger API Server
//!
//! The HTTP surface of the inventory service: bearer-token auth gate, role
//! guards, tenant-scoped handlers, the spreadsheet upload endpoint, and the
//! conditional metrics/docs exposure.

pub mod docs;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use docs::ApiDoc;
pub use error::{ApiError, Result};
pub use server::{Server, ServerConfig};
pub use state::AppState;
