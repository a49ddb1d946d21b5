//! Site endpoints

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use siteledger_core::auth::{AuthContext, Role};
use siteledger_core::models::Site;
use siteledger_core::store::sites::{self, NewSite, SitePatch};
use siteledger_core::store::{ListParams, Page};

use crate::error::Result;
use crate::routes::AppJson;
use crate::state::AppState;

const WRITE_ROLES: &[Role] = &[Role::OrgAdmin];

#[utoipa::path(
    get,
    path = "/sites",
    tag = "sites",
    responses((status = 200, description = "Page of sites"))
)]
pub async fn list_sites(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Site>>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let page = sites::list(session.conn(), ctx.org_id, &params).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/sites",
    tag = "sites",
    request_body = NewSite,
    responses((status = 201, description = "Created", body = Site))
)]
pub async fn create_site(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(body): AppJson<NewSite>,
) -> Result<(StatusCode, Json<Site>)> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let site = sites::create(session.conn(), ctx.org_id, &body).await?;
    Ok((StatusCode::CREATED, Json(site)))
}

#[utoipa::path(
    get,
    path = "/sites/{id}",
    tag = "sites",
    params(("id" = i64, Path, description = "Site id")),
    responses((status = 200, description = "The site", body = Site))
)]
pub async fn get_site(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<Site>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let site = sites::get(session.conn(), ctx.org_id, id).await?;
    Ok(Json(site))
}

#[utoipa::path(
    put,
    path = "/sites/{id}",
    tag = "sites",
    params(("id" = i64, Path, description = "Site id")),
    request_body = SitePatch,
    responses((status = 200, description = "Updated", body = Site))
)]
pub async fn update_site(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<SitePatch>,
) -> Result<Json<Site>> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let site = sites::update(session.conn(), ctx.org_id, id, &patch).await?;
    Ok(Json(site))
}

#[utoipa::path(
    delete,
    path = "/sites/{id}",
    tag = "sites",
    params(("id" = i64, Path, description = "Site id")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_site(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    sites::delete(session.conn(), ctx.org_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
