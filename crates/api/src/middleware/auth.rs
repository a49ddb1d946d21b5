//! The auth gate
//!
//! Runs on every request. Public paths pass through untouched; everything
//! else must carry `Authorization: Bearer <token>`. On success the request
//! gains an [`AuthContext`] extension, and responses for tokens within an
//! hour of expiry gain advisory `X-Token-Expires-At` / `X-Token-Expires-In`
//! headers.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use siteledger_core::auth::AuthContext;

use crate::error::ApiError;
use crate::state::AppState;

/// Paths that bypass authentication. Docs and metrics stay listed even when
/// their feature flags are off; the routes simply do not exist then.
const PUBLIC_PATHS: &[&str] = &["/health", "/dbping", "/auth/login", "/openapi.yaml", "/metrics"];
const PUBLIC_PREFIXES: &[&str] = &["/docs", "/api-docs"];

/// Advisory expiry headers appear once remaining lifetime drops this low.
const EXPIRY_ADVISORY_WINDOW: i64 = 3600;

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p))
}

pub async fn auth_gate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if is_public(req.uri().path()) {
        return next.run(req).await;
    }

    let ctx = match authenticate(&state, req.headers()) {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };

    debug!(user_id = ctx.user_id, org_id = ctx.org_id, "request authenticated");
    let expires_at = ctx.expires_at;
    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;
    advise_expiry(&mut response, expires_at);
    response
}

/// Parse and verify the bearer token. Each failure shape keeps its own code:
/// missing header, wrong scheme, empty token, non-token structure, then the
/// verifier's own taxonomy.
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| ApiError::InvalidAuthFormat)?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(ApiError::InvalidAuthFormat)?
        .trim();

    if token.is_empty() {
        return Err(ApiError::MissingToken);
    }
    if token.split('.').count() != 3 {
        return Err(ApiError::InvalidTokenFormat);
    }

    let claims = state.tokens.verify(token)?;
    AuthContext::from_claims(&claims).map_err(|_| ApiError::AuthenticationRequired)
}

/// Attach advisory expiry headers when the token is within an hour of dying.
/// The headers are informational; their absence is never an error.
fn advise_expiry(response: &mut Response, expires_at: DateTime<Utc>) {
    let remaining = expires_at - Utc::now();
    if remaining <= Duration::zero() || remaining > Duration::seconds(EXPIRY_ADVISORY_WINDOW) {
        return;
    }

    let headers = response.headers_mut();
    if let Ok(at) = expires_at.to_rfc3339().parse() {
        headers.insert("X-Token-Expires-At", at);
    }
    if let Ok(secs) = remaining.num_seconds().to_string().parse() {
        headers.insert("X-Token-Expires-In", secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_public_path_classification() {
        for path in [
            "/health",
            "/dbping",
            "/auth/login",
            "/metrics",
            "/openapi.yaml",
            "/docs",
            "/docs/index.html",
            "/api-docs/openapi.json",
        ] {
            assert!(is_public(path), "{}", path);
        }
        for path in ["/assets", "/auth/profile", "/organizations", "/imports/excel"] {
            assert!(!is_public(path), "{}", path);
        }
    }

    #[test]
    fn test_advisory_headers_only_near_expiry() {
        let mut response = Response::new(Body::empty());
        advise_expiry(&mut response, Utc::now() + Duration::hours(24));
        assert!(response.headers().get("X-Token-Expires-At").is_none());

        let mut response = Response::new(Body::empty());
        advise_expiry(&mut response, Utc::now() + Duration::minutes(30));
        assert!(response.headers().get("X-Token-Expires-At").is_some());
        let expires_in: i64 = response
            .headers()
            .get("X-Token-Expires-In")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(expires_in > 0 && expires_in <= 1800);
    }
}
