//! Per-entity query modules
//!
//! Every function takes `&mut PgConnection` — the caller's tenant session —
//! and the context organization, which is bound into every statement. The
//! session variable and the row-visibility policies back this up when RLS is
//! enabled, but the explicit filter is always present.

pub mod assets;
pub mod items;
pub mod orgs;
pub mod projects;
pub mod sites;
pub mod users;
pub mod vendors;

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use utoipa::ToSchema;

use crate::error::{CoreError, Result};

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

/// Pagination slice of a list response.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PageMeta {
    pub limit: i64,
    pub offset: i64,
    /// Exact count of rows matching the filter, before limit/offset.
    pub total: i64,
}

/// The list envelope: `{ "data": [...], "page": { limit, offset, total } }`.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: PageMeta,
}

/// Common list query parameters shared by every list endpoint.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub site_id: Option<i64>,
    #[serde(rename = "type")]
    pub asset_type: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Translate a `sort` parameter into an ORDER BY body against a whitelist.
///
/// Comma-separated keys, `-` prefix for descending. Keys outside the
/// whitelist are a validation error: sort input is the one list parameter
/// that reaches the statement text rather than a bind.
pub fn order_by_clause(sort: Option<&str>, allowed: &[&str], default: &str) -> Result<String> {
    let Some(sort) = sort.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(default.to_string());
    };

    let mut parts = Vec::new();
    for key in sort.split(',') {
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let (column, direction) = match key.strip_prefix('-') {
            Some(column) => (column, "desc"),
            None => (key, "asc"),
        };
        if !allowed.contains(&column) {
            return Err(CoreError::validation(format!(
                "cannot sort by: {}",
                column
            )));
        }
        parts.push(format!("{} {}", column, direction));
    }

    if parts.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(parts.join(", "))
    }
}

/// Read the windowed total from a page of rows. Empty pages carry no window,
/// so callers fall back to a count query when the offset ran past the end.
pub(crate) fn window_total(rows: &[PgRow]) -> i64 {
    rows.first()
        .map(|row| row.get::<i64, _>("total"))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[&str] = &["id", "name", "created_at"];

    #[test]
    fn test_order_by_default() {
        assert_eq!(order_by_clause(None, ALLOWED, "id asc").unwrap(), "id asc");
        assert_eq!(
            order_by_clause(Some("  "), ALLOWED, "id asc").unwrap(),
            "id asc"
        );
    }

    #[test]
    fn test_order_by_multi_key() {
        assert_eq!(
            order_by_clause(Some("name,-created_at"), ALLOWED, "id asc").unwrap(),
            "name asc, created_at desc"
        );
    }

    #[test]
    fn test_order_by_rejects_unknown_column() {
        let err = order_by_clause(Some("password_digest"), ALLOWED, "id asc").unwrap_err();
        assert_eq!(err.code(), "validation_error");

        // Injection attempts are just unknown columns.
        let err = order_by_clause(Some("id; drop table users"), ALLOWED, "id asc").unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn test_limit_clamping() {
        let params = ListParams {
            limit: Some(1000),
            offset: Some(-5),
            ..ListParams::default()
        };
        assert_eq!(params.limit(), MAX_LIMIT);
        assert_eq!(params.offset(), 0);

        let params = ListParams::default();
        assert_eq!(params.limit(), DEFAULT_LIMIT);
        assert_eq!(params.offset(), 0);

        let params = ListParams {
            limit: Some(0),
            ..ListParams::default()
        };
        assert_eq!(params.limit(), 1);
    }
}
