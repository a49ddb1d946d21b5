//! Asset endpoints: CRUD, subtype projections, and per-site counters

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;

use siteledger_core::auth::{AuthContext, Role};
use siteledger_core::models::asset::{
    Asset, AssetPatch, NewAsset, SiteAssetCategory, SwitchAsset, VlanAsset,
};
use siteledger_core::store::assets;
use siteledger_core::store::{ListParams, Page};

use crate::error::Result;
use crate::routes::AppJson;
use crate::state::AppState;

const WRITE_ROLES: &[Role] = &[Role::OrgAdmin, Role::ProjectAdmin];
const DELETE_ROLES: &[Role] = &[Role::OrgAdmin];

/// List assets
///
/// Filters: `site_id`, `type`, `q` (case-insensitive name match). Sort keys:
/// id, name, asset_type, vendor, created_at, updated_at.
#[utoipa::path(
    get,
    path = "/assets",
    tag = "assets",
    responses(
        (status = 200, description = "Page of assets"),
    )
)]
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Asset>>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let page = assets::list(session.conn(), ctx.org_id, &params).await?;
    Ok(Json(page))
}

/// Create an asset
///
/// A `switch` or `vlan` sub-payload is written in the same transaction; a
/// duplicate serial within (org, site, type) is a 409.
#[utoipa::path(
    post,
    path = "/assets",
    tag = "assets",
    request_body = NewAsset,
    responses(
        (status = 201, description = "Created", body = Asset),
        (status = 409, description = "Duplicate serial", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(body): AppJson<NewAsset>,
) -> Result<(StatusCode, Json<Asset>)> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let asset = assets::create(session.conn(), ctx.org_id, &body).await?;
    info!(asset_id = asset.id, org_id = ctx.org_id, "asset created");
    Ok((StatusCode::CREATED, Json(asset)))
}

/// Fetch one asset
#[utoipa::path(
    get,
    path = "/assets/{id}",
    tag = "assets",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "The asset", body = Asset),
        (status = 404, description = "Unknown or out of scope", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<Asset>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let asset = assets::get(session.conn(), ctx.org_id, id).await?;
    Ok(Json(asset))
}

/// Update an asset
#[utoipa::path(
    put,
    path = "/assets/{id}",
    tag = "assets",
    params(("id" = i64, Path, description = "Asset id")),
    request_body = AssetPatch,
    responses(
        (status = 200, description = "Updated", body = Asset),
    )
)]
pub async fn update_asset(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<AssetPatch>,
) -> Result<Json<Asset>> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let asset = assets::update(session.conn(), ctx.org_id, id, &patch).await?;
    Ok(Json(asset))
}

/// Delete an asset
#[utoipa::path(
    delete,
    path = "/assets/{id}",
    tag = "assets",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 204, description = "Deleted"),
    )
)]
pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    ctx.require_any(DELETE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    assets::delete(session.conn(), ctx.org_id, id).await?;
    info!(asset_id = id, org_id = ctx.org_id, "asset deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Switch projection
#[utoipa::path(
    get,
    path = "/switches",
    tag = "assets",
    responses(
        (status = 200, description = "Page of switches"),
    )
)]
pub async fn list_switches(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<SwitchAsset>>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let page = assets::list_switches(session.conn(), ctx.org_id, &params).await?;
    Ok(Json(page))
}

/// VLAN projection, sortable by `vlan_id` in addition to the asset keys
#[utoipa::path(
    get,
    path = "/vlans",
    tag = "assets",
    responses(
        (status = 200, description = "Page of VLANs"),
    )
)]
pub async fn list_vlans(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<VlanAsset>>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let page = assets::list_vlans(session.conn(), ctx.org_id, &params).await?;
    Ok(Json(page))
}

/// Per-site asset counters, ordered by asset type
#[utoipa::path(
    get,
    path = "/sites/{id}/asset-categories",
    tag = "assets",
    params(("id" = i64, Path, description = "Site id")),
    responses(
        (status = 200, description = "Counter rows", body = [SiteAssetCategory]),
    )
)]
pub async fn site_categories(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<SiteAssetCategory>>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let categories = assets::site_categories(session.conn(), ctx.org_id, id).await?;
    Ok(Json(categories))
}
