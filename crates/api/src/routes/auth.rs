//! Login and self-service account endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use siteledger_core::auth::{password, AuthContext};
use siteledger_core::models::User;
use siteledger_core::store::users;
use siteledger_core::store::users::ProfilePatch;
use siteledger_core::CoreError;

use crate::error::{ApiError, Result};
use crate::routes::AppJson;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Obtain a session token
///
/// Failures are uniform `invalid_credentials`, whether the account exists,
/// is deactivated, or the password is wrong.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let email = body.email.trim().to_ascii_lowercase();

    let mut session = state.db.auth_session().await?;
    let user = users::find_by_email(session.conn(), &email).await?;

    let Some(user) = user else {
        warn!(email = %email, "login failed: unknown account");
        return Err(CoreError::InvalidCredentials.into());
    };
    if !user.is_active || !password::verify_password(&body.password, &user.password_digest) {
        warn!(user_id = user.id, "login failed");
        return Err(CoreError::InvalidCredentials.into());
    }

    users::touch_last_login(session.conn(), user.id).await?;
    let token = state.tokens.issue(user.id, user.org_id, &user.roles)?;

    info!(user_id = user.id, org_id = user.org_id, "login succeeded");
    Ok(Json(LoginResponse { token, user }))
}

/// Read the caller's own account
#[utoipa::path(
    get,
    path = "/auth/profile",
    tag = "auth",
    responses(
        (status = 200, description = "The caller's account", body = User),
    )
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<User>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let user = users::get(session.conn(), Some(ctx.org_id), ctx.user_id).await?;
    Ok(Json(user))
}

/// Update the caller's own identity fields
#[utoipa::path(
    put,
    path = "/auth/profile",
    tag = "auth",
    request_body = ProfilePatch,
    responses(
        (status = 200, description = "Updated account", body = User),
    )
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(patch): AppJson<ProfilePatch>,
) -> Result<Json<User>> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    // Scope check before the write; the profile update itself keys on id.
    users::get(session.conn(), Some(ctx.org_id), ctx.user_id).await?;
    let user = users::update_profile(session.conn(), ctx.user_id, &patch).await?;
    Ok(Json(user))
}

/// Change the caller's password, current password required
#[utoipa::path(
    put,
    path = "/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password wrong", body = crate::error::ErrorResponse),
    )
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    AppJson(body): AppJson<ChangePasswordRequest>,
) -> Result<axum::http::StatusCode> {
    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let user = users::get(session.conn(), Some(ctx.org_id), ctx.user_id).await?;

    if !password::verify_password(&body.current_password, &user.password_digest) {
        return Err(ApiError::Core(CoreError::InvalidCredentials));
    }

    users::set_password(session.conn(), ctx.user_id, &body.new_password).await?;
    info!(user_id = ctx.user_id, "password changed");
    Ok(axum::http::StatusCode::NO_CONTENT)
}
