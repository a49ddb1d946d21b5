//! Generic inventory endpoints

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use siteledger_core::auth::{AuthContext, Role};
use siteledger_core::models::Item;
use siteledger_core::store::items::{self, ItemPatch, NewItem};
use siteledger_core::store::{ListParams, Page};

use crate::error::Result;
use crate::routes::AppJson;
use crate::state::AppState;

const WRITE_ROLES: &[Role] = &[Role::OrgAdmin, Role::ProjectAdmin];
const DELETE_ROLES: &[Role] = &[Role::OrgAdmin];

#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    responses((status = 200, description = "Page of items"))
)]
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Item>>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let page = items::list(session.conn(), ctx.org_id, &params).await?;
    Ok(Json(page))
}

/// Duplicate `asset_tag` is a 409 `duplicate_asset_tag`.
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    request_body = NewItem,
    responses(
        (status = 201, description = "Created", body = Item),
        (status = 409, description = "Asset tag taken", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(body): AppJson<NewItem>,
) -> Result<(StatusCode, Json<Item>)> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let item = items::create(session.conn(), ctx.org_id, &body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(("id" = i64, Path, description = "Item id")),
    responses((status = 200, description = "The item", body = Item))
)]
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<Item>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let item = items::get(session.conn(), ctx.org_id, id).await?;
    Ok(Json(item))
}

#[utoipa::path(
    put,
    path = "/items/{id}",
    tag = "items",
    params(("id" = i64, Path, description = "Item id")),
    request_body = ItemPatch,
    responses((status = 200, description = "Updated", body = Item))
)]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<ItemPatch>,
) -> Result<Json<Item>> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let item = items::update(session.conn(), ctx.org_id, id, &patch).await?;
    Ok(Json(item))
}

#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "items",
    params(("id" = i64, Path, description = "Item id")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    ctx.require_any(DELETE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    items::delete(session.conn(), ctx.org_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
