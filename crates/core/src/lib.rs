//! SiteLedger core
//!
//! Shared foundation for the API server and the import pipeline: configuration,
//! authentication primitives, the tenant-scoped database layer, domain models,
//! and the per-entity store modules.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod store;

pub use config::AppConfig;
pub use db::{Database, TenantSession};
pub use error::{CoreError, Result};

/// Organization id of the main tenant. Members of this organization with the
/// `org_admin` role see and may mutate data across all organizations.
pub const MAIN_TENANT_ORG_ID: i64 = 1;
