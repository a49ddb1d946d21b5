//! API routes

pub mod assets;
pub mod auth;
pub mod health;
pub mod imports;
pub mod items;
pub mod organizations;
pub mod projects;
pub mod sites;
pub mod users;
pub mod vendors;

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequest, Request};
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use serde::de::DeserializeOwned;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::{self, ApiDoc};
use crate::error::ApiError;
use crate::state::AppState;
use crate::{metrics, middleware as mw};

/// Upload cap for `/imports/excel`. The handler enforces the 20 MiB limit
/// with its own error shape; the body limit sits slightly above it so
/// oversized uploads reach that check instead of a bare 413.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Create the main API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        // Public surface
        .route("/health", get(health::health_check))
        .route("/dbping", get(health::db_ping))
        .route("/auth/login", post(auth::login))
        // Self-service
        .route(
            "/auth/profile",
            get(auth::get_profile).put(auth::update_profile),
        )
        .route("/auth/change-password", put(auth::change_password))
        // Organizations (main tenant)
        .route(
            "/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/organizations/:id",
            get(organizations::get_organization)
                .put(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route("/organizations/:id/stats", get(organizations::organization_stats))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Sites
        .route("/sites", get(sites::list_sites).post(sites::create_site))
        .route(
            "/sites/:id",
            get(sites::get_site)
                .put(sites::update_site)
                .delete(sites::delete_site),
        )
        .route("/sites/:id/asset-categories", get(assets::site_categories))
        // Vendors
        .route(
            "/vendors",
            get(vendors::list_vendors).post(vendors::create_vendor),
        )
        .route(
            "/vendors/:id",
            get(vendors::get_vendor)
                .put(vendors::update_vendor)
                .delete(vendors::delete_vendor),
        )
        // Projects
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/projects/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        // Generic inventory
        .route("/items", get(items::list_items).post(items::create_item))
        .route(
            "/items/:id",
            get(items::get_item)
                .put(items::update_item)
                .delete(items::delete_item),
        )
        // Assets and subtype projections
        .route(
            "/assets",
            get(assets::list_assets).post(assets::create_asset),
        )
        .route(
            "/assets/:id",
            get(assets::get_asset)
                .put(assets::update_asset)
                .delete(assets::delete_asset),
        )
        .route("/switches", get(assets::list_switches))
        .route("/vlans", get(assets::list_vlans))
        // Spreadsheet ingestion
        .route(
            "/imports/excel",
            post(imports::upload_excel)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024)),
        );

    if state.config.metrics_enabled {
        app = app.route("/metrics", get(metrics::exposition));
    }

    // Docs must join the router before the layers below so they pass
    // through the gate's public-path classifier like every other route.
    if state.config.docs_enabled {
        let swagger = SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi());
        app = app
            .merge(swagger)
            .route("/openapi.yaml", get(docs::openapi_yaml));
    }

    app.layer(middleware::from_fn_with_state(
        state.clone(),
        mw::auth::auth_gate,
    ))
    .layer(middleware::from_fn(metrics::track))
    .with_state(state)
}

/// `Json` with the rejection rewritten into the standard error body.
pub struct AppJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(ApiError::InvalidJson(rejection.body_text())),
        }
    }
}
