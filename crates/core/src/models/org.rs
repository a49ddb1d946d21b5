use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A tenant. Organization 1 is the main tenant: singleton, undeletable,
/// and its org_admin members operate across all organizations.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Organization {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-organization row counts for `GET /organizations/{id}/stats`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct OrgStats {
    pub org_id: i64,
    pub users: i64,
    pub sites: i64,
    pub vendors: i64,
    pub projects: i64,
    pub items: i64,
}
