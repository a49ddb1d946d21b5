//! User store
//!
//! `org_filter` is the tenant scope computed by the handler: `Some(org)` pins
//! queries to one organization, `None` spans all of them and is only ever
//! produced for a main-tenant context.

use chrono::Utc;
use serde::Deserialize;
use sqlx::{Connection, FromRow, PgConnection, Row};
use tracing::debug;
use utoipa::ToSchema;

use crate::auth::password;
use crate::auth::roles::{validate_roles, Role};
use crate::error::{CoreError, Result};
use crate::models::User;
use crate::store::{order_by_clause, window_total, ListParams, Page, PageMeta};

const USER_SORT: &[&str] = &["id", "email", "first_name", "last_name", "created_at", "updated_at"];

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub roles: Vec<String>,
    /// Target organization; only honored for a main-tenant caller.
    #[serde(default)]
    pub org_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserPatch {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    /// Cross-org move; only honored for a main-tenant caller.
    #[serde(default)]
    pub org_id: Option<i64>,
}

/// Self-service profile update: identity fields only.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProfilePatch {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Look up an account for login. Spans organizations: identity resolution
/// happens before a tenant context exists.
pub async fn find_by_email(conn: &mut PgConnection, email: &str) -> Result<Option<User>> {
    let row = sqlx::query("select * from users where email = $1")
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
        .map_err(CoreError::from)?;
    row.map(|r| User::from_row(&r).map_err(CoreError::from))
        .transpose()
}

pub async fn get(conn: &mut PgConnection, org_filter: Option<i64>, id: i64) -> Result<User> {
    let row = sqlx::query(
        "select * from users where id = $1 and ($2::bigint is null or org_id = $2)",
    )
    .bind(id)
    .bind(org_filter)
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?
    .ok_or(CoreError::NotFound)?;
    User::from_row(&row).map_err(CoreError::from)
}

pub async fn list(
    conn: &mut PgConnection,
    org_filter: Option<i64>,
    params: &ListParams,
) -> Result<Page<User>> {
    let order = order_by_clause(params.sort.as_deref(), USER_SORT, "id asc")?;
    let (limit, offset) = (params.limit(), params.offset());

    let sql = format!(
        r#"
        select *, count(*) over () as total
        from users
        where ($1::bigint is null or org_id = $1)
          and ($2::text is null or email ilike '%' || $2 || '%'
               or first_name ilike '%' || $2 || '%'
               or last_name ilike '%' || $2 || '%')
        order by {order}
        limit $3 offset $4
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(org_filter)
        .bind(&params.q)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
        .map_err(CoreError::from)?;

    let total = window_total(&rows);
    let data = rows
        .iter()
        .map(User::from_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CoreError::from)?;

    Ok(Page {
        data,
        page: PageMeta { limit, offset, total },
    })
}

/// Create a user in the given organization. Roles must be a non-empty subset
/// of the known set; the password is hashed here so plaintext never reaches
/// the row.
pub async fn create(conn: &mut PgConnection, org_id: i64, new: &NewUser) -> Result<User> {
    let email = new.email.trim().to_ascii_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(CoreError::validation("a valid email is required"));
    }
    let roles = validate_roles(&new.roles)?;
    let digest = password::hash_password(&new.password)?;

    let row = sqlx::query(
        r#"
        insert into users (org_id, email, password_digest, first_name, last_name, roles)
        values ($1, $2, $3, $4, $5, $6)
        returning *
        "#,
    )
    .bind(org_id)
    .bind(&email)
    .bind(&digest)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(roles.iter().map(Role::as_str).map(String::from).collect::<Vec<_>>())
    .fetch_one(&mut *conn)
    .await
    .map_err(CoreError::from)?;

    let user = User::from_row(&row).map_err(CoreError::from)?;
    debug!(user_id = user.id, org_id, "user created");
    Ok(user)
}

/// Administrative update. Role changes are validated; deactivating the last
/// active org_admin of an organization, or stripping their role, is rejected.
pub async fn update(
    conn: &mut PgConnection,
    org_filter: Option<i64>,
    id: i64,
    patch: &UserPatch,
) -> Result<User> {
    let mut tx = conn.begin().await?;

    let current = {
        let row = sqlx::query(
            "select * from users where id = $1 and ($2::bigint is null or org_id = $2) for update",
        )
        .bind(id)
        .bind(org_filter)
        .fetch_optional(&mut *tx)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::NotFound)?;
        User::from_row(&row).map_err(CoreError::from)?
    };

    let roles = match &patch.roles {
        Some(roles) => Some(validate_roles(roles)?),
        None => None,
    };

    let email = match &patch.email {
        Some(email) => {
            let email = email.trim().to_ascii_lowercase();
            if email.is_empty() || !email.contains('@') {
                return Err(CoreError::validation("a valid email is required"));
            }
            Some(email)
        }
        None => None,
    };

    // Would this update cost the org its last active admin?
    let was_admin = current.is_active && current.roles.iter().any(|r| r == "org_admin");
    let stays_admin = patch.is_active.unwrap_or(current.is_active)
        && roles
            .as_ref()
            .map(|r| r.contains(&Role::OrgAdmin))
            .unwrap_or_else(|| current.roles.iter().any(|r| r == "org_admin"))
        && patch.org_id.map(|o| o == current.org_id).unwrap_or(true);
    if was_admin && !stays_admin {
        assert_not_last_admin(&mut tx, current.org_id, current.id).await?;
    }

    let row = sqlx::query(
        r#"
        update users set
            org_id     = coalesce($3, org_id),
            email      = coalesce($4, email),
            first_name = coalesce($5, first_name),
            last_name  = coalesce($6, last_name),
            roles      = coalesce($7, roles),
            is_active  = coalesce($8, is_active),
            updated_at = now()
        where id = $1 and ($2::bigint is null or org_id = $2)
        returning *
        "#,
    )
    .bind(id)
    .bind(org_filter)
    .bind(patch.org_id)
    .bind(email)
    .bind(&patch.first_name)
    .bind(&patch.last_name)
    .bind(roles.map(|r| r.iter().map(Role::as_str).map(String::from).collect::<Vec<_>>()))
    .bind(patch.is_active)
    .fetch_optional(&mut *tx)
    .await
    .map_err(CoreError::from)?
    .ok_or(CoreError::NotFound)?;

    let user = User::from_row(&row).map_err(CoreError::from)?;
    tx.commit().await?;
    debug!(user_id = user.id, "user updated");
    Ok(user)
}

pub async fn delete(conn: &mut PgConnection, org_filter: Option<i64>, id: i64) -> Result<()> {
    let mut tx = conn.begin().await?;

    let current = {
        let row = sqlx::query(
            "select * from users where id = $1 and ($2::bigint is null or org_id = $2) for update",
        )
        .bind(id)
        .bind(org_filter)
        .fetch_optional(&mut *tx)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::NotFound)?;
        User::from_row(&row).map_err(CoreError::from)?
    };

    if current.is_active && current.roles.iter().any(|r| r == "org_admin") {
        assert_not_last_admin(&mut tx, current.org_id, current.id).await?;
    }

    sqlx::query("delete from users where id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::from)?;

    tx.commit().await?;
    debug!(user_id = id, "user deleted");
    Ok(())
}

/// Record a successful login.
pub async fn touch_last_login(conn: &mut PgConnection, user_id: i64) -> Result<()> {
    sqlx::query("update users set last_login_at = $2 where id = $1")
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await
        .map_err(CoreError::from)?;
    Ok(())
}

/// Self-service profile update.
pub async fn update_profile(
    conn: &mut PgConnection,
    user_id: i64,
    patch: &ProfilePatch,
) -> Result<User> {
    let email = match &patch.email {
        Some(email) => {
            let email = email.trim().to_ascii_lowercase();
            if email.is_empty() || !email.contains('@') {
                return Err(CoreError::validation("a valid email is required"));
            }
            Some(email)
        }
        None => None,
    };

    let row = sqlx::query(
        r#"
        update users set
            email      = coalesce($2, email),
            first_name = coalesce($3, first_name),
            last_name  = coalesce($4, last_name),
            updated_at = now()
        where id = $1
        returning *
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(&patch.first_name)
    .bind(&patch.last_name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?
    .ok_or(CoreError::NotFound)?;

    User::from_row(&row).map_err(CoreError::from)
}

/// Replace a password digest. The caller has already verified the current
/// password.
pub async fn set_password(conn: &mut PgConnection, user_id: i64, new_password: &str) -> Result<()> {
    let digest = password::hash_password(new_password)?;
    let result = sqlx::query(
        "update users set password_digest = $2, updated_at = now() where id = $1",
    )
    .bind(user_id)
    .bind(&digest)
    .execute(&mut *conn)
    .await
    .map_err(CoreError::from)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

/// Count check backing invariant 6: an organization keeps at least one
/// active org_admin.
async fn assert_not_last_admin(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    org_id: i64,
    user_id: i64,
) -> Result<()> {
    let row = sqlx::query(
        r#"
        select count(*) as remaining
        from users
        where org_id = $1
          and id <> $2
          and is_active
          and 'org_admin' = any(roles)
        "#,
    )
    .bind(org_id)
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(CoreError::from)?;

    let remaining: i64 = row.get("remaining");
    if remaining == 0 {
        return Err(CoreError::CannotDeleteLastAdmin);
    }
    Ok(())
}
