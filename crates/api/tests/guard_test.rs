//! Router-level tests for the auth gate and role guards
//!
//! These drive the real router through `oneshot` with a lazily connected
//! pool: every assertion here short-circuits before any query, so no
//! database is required.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use siteledger_api::routes::create_router;
use siteledger_api::AppState;
use siteledger_core::{AppConfig, Database, MAIN_TENANT_ORG_ID};

fn test_config() -> AppConfig {
    AppConfig {
        // Nothing listens on port 1; lazy connections fail fast when a
        // handler actually touches the pool.
        database_url: "postgres://127.0.0.1:1/siteledger_test".to_string(),
        db_connection_timeout_secs: 1,
        jwt_expiry_secs: 1800,
        ..AppConfig::default()
    }
}

fn test_app() -> (Router, Arc<AppState>) {
    let config = test_config();
    let db = Database::connect_lazy(&config).expect("lazy pool");
    let state = Arc::new(AppState::new(db, config));
    (create_router(state.clone()), state)
}

fn token_for(state: &AppState, org_id: i64, roles: &[&str]) -> String {
    let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    state.tokens.issue(7, org_id, &roles).expect("token")
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = test_app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_protected_path_requires_header() {
    let (app, _) = test_app();
    let response = app
        .oneshot(Request::get("/assets").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["code"], "missing_auth_header");
}

#[tokio::test]
async fn test_wrong_scheme_is_distinct() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::get("/assets")
                .header(header::AUTHORIZATION, "Basic dXNlcjpwdw==")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "invalid_auth_format");
}

#[tokio::test]
async fn test_empty_token_is_distinct() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::get("/assets")
                .header(header::AUTHORIZATION, "Bearer ")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "missing_token");
}

#[tokio::test]
async fn test_structurally_broken_token_is_distinct() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::get("/assets")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "invalid_token_format");
}

#[tokio::test]
async fn test_foreign_signature_rejected() {
    let (app, _) = test_app();

    // Token minted under a different key.
    let other_config = AppConfig {
        jwt_secret: "another-signing-key-of-enough-bytes!".to_string(),
        ..test_config()
    };
    let other = siteledger_core::auth::TokenManager::new(&other_config);
    let token = other.issue(7, 1, &["viewer".to_string()]).unwrap();

    let response = app
        .oneshot(
            Request::get("/assets")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "authentication_required");
}

#[tokio::test]
async fn test_viewer_cannot_write_items() {
    let (app, state) = test_app();
    let token = token_for(&state, 2, &["viewer"]);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/items")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"asset_tag":"T-1","name":"thing"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "insufficient_permissions");
}

#[tokio::test]
async fn test_viewer_cannot_delete_assets() {
    let (app, state) = test_app();
    let token = token_for(&state, 2, &["project_admin"]);

    // project_admin may create and update assets but not delete them.
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri("/assets/5")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "insufficient_permissions");
}

#[tokio::test]
async fn test_non_main_tenant_cannot_reach_other_org() {
    let (app, state) = test_app();
    let token = token_for(&state, 2, &["org_admin"]);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/users")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"email":"new@org42.test","password":"Password123!","roles":["viewer"],"org_id":42}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "forbidden_org_change");
}

#[tokio::test]
async fn test_org_routes_reserved_to_main_tenant() {
    let (app, state) = test_app();
    let token = token_for(&state, 2, &["org_admin"]);

    let response = app
        .oneshot(
            Request::get("/organizations")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "access_denied");
}

#[tokio::test]
async fn test_expiry_advisory_headers_near_expiry() {
    // 30-minute tokens sit inside the one-hour advisory window, so even an
    // error response carries the hints.
    let (app, state) = test_app();
    assert_eq!(state.config.jwt_expiry_secs, 1800);
    let token = token_for(&state, MAIN_TENANT_ORG_ID, &["viewer"]);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/items")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"asset_tag":"T-2","name":"thing"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    let expires_at = response.headers().get("X-Token-Expires-At");
    assert!(expires_at.is_some());
    let expires_in: i64 = response
        .headers()
        .get("X-Token-Expires-In")
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(expires_in > 0 && expires_in <= 3600);
}

#[tokio::test]
async fn test_long_lived_token_has_no_advisory_headers() {
    let config = AppConfig {
        jwt_expiry_secs: 24 * 3600,
        ..test_config()
    };
    let db = Database::connect_lazy(&config).expect("lazy pool");
    let state = Arc::new(AppState::new(db, config));
    let app = create_router(state.clone());
    let token = token_for(&state, 2, &["viewer"]);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/items")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"asset_tag":"T-3","name":"thing"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.headers().get("X-Token-Expires-At").is_none());
    assert!(response.headers().get("X-Token-Expires-In").is_none());
}

#[tokio::test]
async fn test_invalid_json_body_is_400() {
    let (app, state) = test_app();
    let token = token_for(&state, MAIN_TENANT_ORG_ID, &["org_admin"]);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/organizations")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "invalid_json");
}

#[tokio::test]
async fn test_metrics_route_absent_by_default() {
    let (app, _) = test_app();
    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore] // Requires a reachable database
async fn test_dbping_against_real_database() {
    let config = AppConfig {
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/siteledger".to_string()),
        ..AppConfig::default()
    };
    let db = Database::new(&config).await.expect("connect");
    let state = Arc::new(AppState::new(db, config));
    let app = create_router(state);

    let response = app
        .oneshot(Request::get("/dbping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
