//! Project endpoints

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use siteledger_core::auth::{AuthContext, Role};
use siteledger_core::models::Project;
use siteledger_core::store::projects::{self, NewProject, ProjectPatch};
use siteledger_core::store::{ListParams, Page};

use crate::error::Result;
use crate::routes::AppJson;
use crate::state::AppState;

const WRITE_ROLES: &[Role] = &[Role::OrgAdmin];

#[utoipa::path(
    get,
    path = "/projects",
    tag = "projects",
    responses((status = 200, description = "Page of projects"))
)]
pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<Project>>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let page = projects::list(session.conn(), ctx.org_id, &params).await?;
    Ok(Json(page))
}

/// Duplicate `(org, code)` is a 409 `duplicate_project_code`.
#[utoipa::path(
    post,
    path = "/projects",
    tag = "projects",
    request_body = NewProject,
    responses(
        (status = 201, description = "Created", body = Project),
        (status = 409, description = "Code taken", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(body): AppJson<NewProject>,
) -> Result<(StatusCode, Json<Project>)> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let project = projects::create(session.conn(), ctx.org_id, &body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

#[utoipa::path(
    get,
    path = "/projects/{id}",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    responses((status = 200, description = "The project", body = Project))
)]
pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<Json<Project>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let project = projects::get(session.conn(), ctx.org_id, id).await?;
    Ok(Json(project))
}

#[utoipa::path(
    put,
    path = "/projects/{id}",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    request_body = ProjectPatch,
    responses((status = 200, description = "Updated", body = Project))
)]
pub async fn update_project(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
    AppJson(patch): AppJson<ProjectPatch>,
) -> Result<Json<Project>> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let project = projects::update(session.conn(), ctx.org_id, id, &patch).await?;
    Ok(Json(project))
}

#[utoipa::path(
    delete,
    path = "/projects/{id}",
    tag = "projects",
    params(("id" = i64, Path, description = "Project id")),
    responses((status = 204, description = "Deleted"))
)]
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    ctx.require_any(WRITE_ROLES)?;
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    projects::delete(session.conn(), ctx.org_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
