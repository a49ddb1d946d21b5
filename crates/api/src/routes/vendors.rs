//! Vendor endpoints

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use siteledger_core::auth::{AuthContext, Role};
use siteledger_core::models::Vendor;
use siteledger_core::store::vendors::{self, NewVendor, VendorPatch};
use siteledger_core::store::{ListParams, Page};

use crate::error::Result;
use crate::routes::AppJson;
use crate::state::AppState;

const WRITE_ROLES: &[Role] = &[Role::OrgAdmin];

#[utoipa::path(
    get,
    path = "/vendors",
    tag = "vendors",
    responses((status = 200, description = "Page of vendors"))
)]
pub async fn list_vendors(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Vendor>>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let page = vendors::list(session.conn(), ctx.org_id, &params).await?;
    Ok(Json(page))
}

#[utoipa::path(
    post,
    path = "/vendors",
    tag = "vendors",
    request_body = NewVendor,
    responses((status = 201, description = "Created", body = Vendor))
)]
pub async fn create_vendor(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(body): AppJson<NewVendor>,
) -> Result<(StatusCode, Json<Vendor>)> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let vendor = vendors::create(session.conn(), ctx.org_id, &body).await?;
    Ok((StatusCode::CREATED, Json(vendor)))
}

#[utoipa::path(
    get,
    path = "/vendors/{id}",
    tag = "vendors",
    params(("id" = i64, Path, description = "Vendor id")),
    responses((status = 200, description = "The vendor", body = Vendor))
)]
pub async fn get_vendor(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<Vendor>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let vendor = vendors::get(session.conn(), ctx.org_id, id).await?;
    Ok(Json(vendor))
}

#[utoipa::path(
    put,
    path = "/vendors/{id}",
    tag = "vendors",
    params(("id" = i64, Path, description = "Vendor id")),
    request_body = VendorPatch,
    responses((status = 200, description = "Updated", body = Vendor))
)]
pub async fn update_vendor(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<VendorPatch>,
) -> Result<Json<Vendor>> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let vendor = vendors::update(session.conn(), ctx.org_id, id, &patch).await?;
    Ok(Json(vendor))
}

#[utoipa::path(
    delete,
    path = "/vendors/{id}",
    tag = "vendors",
    params(("id" = i64, Path, description = "Vendor id")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_vendor(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    vendors::delete(session.conn(), ctx.org_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
