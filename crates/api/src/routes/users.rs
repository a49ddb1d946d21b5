//! User management. org_admin only; the main tenant may target other
//! organizations explicitly, everyone else is pinned to their own.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use tracing::info;

use siteledger_core::auth::{AuthContext, Role};
use siteledger_core::models::User;
use siteledger_core::store::users::{self, NewUser, UserPatch};
use siteledger_core::store::{ListParams, Page};

use crate::error::Result;
use crate::routes::AppJson;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub q: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Main-tenant only: restrict the listing to one organization.
    pub org_id: Option<i64>,
}

impl UserListQuery {
    fn params(&self) -> ListParams {
        ListParams {
            q: self.q.clone(),
            sort: self.sort.clone(),
            limit: self.limit,
            offset: self.offset,
            ..ListParams::default()
        }
    }
}

/// The org slice this context may see: the main tenant spans all
/// organizations unless it names one; everyone else sees their own.
fn org_filter(ctx: &AuthContext, requested: Option<i64>) -> Result<Option<i64>> {
    if ctx.is_main_tenant() {
        return Ok(requested);
    }
    Ok(Some(ctx.resolve_org(requested)?))
}

/// List users
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "Page of users"),
    )
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Page<User>>> {
    ctx.require_any(&[Role::OrgAdmin])?;
    let filter = org_filter(&ctx, query.org_id)?;

    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let page = users::list(session.conn(), filter, &query.params()).await?;
    Ok(Json(page))
}

/// Create a user
///
/// A main-tenant org_admin may pass `org_id` to create the account in any
/// organization; any other caller naming a different org gets
/// `forbidden_org_change`.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = NewUser,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 403, description = "Cross-org attempt", body = crate::error::ErrorResponse),
        (status = 409, description = "Email taken", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(body): AppJson<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    ctx.require_any(&[Role::OrgAdmin])?;
    let target_org = ctx.resolve_org(body.org_id)?;

    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let user = users::create(session.conn(), target_org, &body).await?;
    info!(user_id = user.id, org_id = target_org, by = ctx.user_id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Fetch one user
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = User),
        (status = 404, description = "Unknown or out of scope", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<User>> {
    ctx.require_any(&[Role::OrgAdmin])?;
    let filter = org_filter(&ctx, None)?;

    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let user = users::get(session.conn(), filter, id).await?;
    Ok(Json(user))
}

/// Update a user
///
/// Role changes are validated; cross-org moves need the main tenant; taking
/// an organization's last active org_admin offline is refused.
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Last admin protection", body = crate::error::ErrorResponse),
    )
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<UserPatch>,
) -> Result<Json<User>> {
    ctx.require_any(&[Role::OrgAdmin])?;
    let filter = org_filter(&ctx, None)?;
    if patch.org_id.is_some() {
        // A cross-org move is an org change; only the main tenant passes.
        ctx.resolve_org(patch.org_id)?;
    }

    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let user = users::update(session.conn(), filter, id, &patch).await?;
    Ok(Json(user))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Last admin protection", body = crate::error::ErrorResponse),
    )
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    ctx.require_any(&[Role::OrgAdmin])?;
    let filter = org_filter(&ctx, None)?;

    let mut session = state.db.tenant_session(ctx.org_id).await?;
    users::delete(session.conn(), filter, id).await?;
    info!(user_id = id, by = ctx.user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
