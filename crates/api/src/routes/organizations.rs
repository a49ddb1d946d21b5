//! Organization management. Reserved to org_admin members of the main tenant.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;

use siteledger_core::auth::{AuthContext, Role};
use siteledger_core::models::{Organization, OrgStats};
use siteledger_core::store::orgs::{self, NewOrganization, OrganizationPatch};
use siteledger_core::store::{ListParams, Page};

use crate::error::{ApiError, Result};
use crate::routes::AppJson;
use crate::state::AppState;

fn require_main_org_admin(ctx: &AuthContext) -> Result<()> {
    ctx.require_any(&[Role::OrgAdmin])?;
    if !ctx.is_main_tenant() {
        return Err(ApiError::AccessDenied);
    }
    Ok(())
}

/// List organizations
#[utoipa::path(
    get,
    path = "/organizations",
    tag = "organizations",
    responses(
        (status = 200, description = "Page of organizations"),
        (status = 403, description = "Not the main tenant", body = crate::error::ErrorResponse),
    )
)]
pub async fn list_organizations(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Organization>>> {
    require_main_org_admin(&ctx)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let page = orgs::list(session.conn(), &params).await?;
    Ok(Json(page))
}

/// Create an organization
#[utoipa::path(
    post,
    path = "/organizations",
    tag = "organizations",
    request_body = NewOrganization,
    responses(
        (status = 201, description = "Created", body = Organization),
        (status = 409, description = "Name taken", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_organization(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(body): AppJson<NewOrganization>,
) -> Result<(StatusCode, Json<Organization>)> {
    require_main_org_admin(&ctx)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let org = orgs::create(session.conn(), &body).await?;
    Ok((StatusCode::CREATED, Json(org)))
}

/// Fetch one organization
#[utoipa::path(
    get,
    path = "/organizations/{id}",
    tag = "organizations",
    params(("id" = i64, Path, description = "Organization id")),
    responses(
        (status = 200, description = "The organization", body = Organization),
        (status = 404, description = "Unknown id", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_organization(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<Organization>> {
    require_main_org_admin(&ctx)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let org = orgs::get(session.conn(), id).await?;
    Ok(Json(org))
}

/// Rename an organization
#[utoipa::path(
    put,
    path = "/organizations/{id}",
    tag = "organizations",
    params(("id" = i64, Path, description = "Organization id")),
    request_body = OrganizationPatch,
    responses(
        (status = 200, description = "Updated", body = Organization),
    )
)]
pub async fn update_organization(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<OrganizationPatch>,
) -> Result<Json<Organization>> {
    require_main_org_admin(&ctx)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let org = orgs::update(session.conn(), id, &patch).await?;
    Ok(Json(org))
}

/// Delete an organization
///
/// Refused for the main tenant and for any organization that still owns data.
#[utoipa::path(
    delete,
    path = "/organizations/{id}",
    tag = "organizations",
    params(("id" = i64, Path, description = "Organization id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Main tenant or organization with data", body = crate::error::ErrorResponse),
    )
)]
pub async fn delete_organization(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    require_main_org_admin(&ctx)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    orgs::delete(session.conn(), id).await?;
    info!(org_id = id, by = ctx.user_id, "organization deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Row counts for one organization
#[utoipa::path(
    get,
    path = "/organizations/{id}/stats",
    tag = "organizations",
    params(("id" = i64, Path, description = "Organization id")),
    responses(
        (status = 200, description = "Counts of users, sites, vendors, projects, items", body = OrgStats),
    )
)]
pub async fn organization_stats(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<OrgStats>> {
    require_main_org_admin(&ctx)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let stats = orgs::stats(session.conn(), id).await?;
    Ok(Json(stats))
}
