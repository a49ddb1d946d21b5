//! Project store. `(org_id, code)` is unique; violations surface as
//! `duplicate_project_code`.

use serde::Deserialize;
use sqlx::{FromRow, PgConnection};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};
use crate::models::Project;
use crate::store::{order_by_clause, window_total, ListParams, Page, PageMeta};

const PROJECT_SORT: &[&str] = &["id", "code", "name", "status", "created_at", "updated_at"];

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewProject {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProjectPatch {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

pub async fn list(
    conn: &mut PgConnection,
    org_id: i64,
    params: &ListParams,
) -> Result<Page<Project>> {
    let order = order_by_clause(params.sort.as_deref(), PROJECT_SORT, "id asc")?;
    let (limit, offset) = (params.limit(), params.offset());

    let sql = format!(
        r#"
        select *, count(*) over () as total
        from projects
        where org_id = $1
          and ($2::text is null or name ilike '%' || $2 || '%' or code ilike '%' || $2 || '%')
        order by {order}
        limit $3 offset $4
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(org_id)
        .bind(&params.q)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
        .map_err(CoreError::from)?;

    let total = window_total(&rows);
    let data = rows
        .iter()
        .map(Project::from_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CoreError::from)?;

    Ok(Page {
        data,
        page: PageMeta { limit, offset, total },
    })
}

pub async fn get(conn: &mut PgConnection, org_id: i64, id: i64) -> Result<Project> {
    let row = sqlx::query("select * from projects where id = $1 and org_id = $2")
        .bind(id)
        .bind(org_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::NotFound)?;
    Project::from_row(&row).map_err(CoreError::from)
}

pub async fn create(conn: &mut PgConnection, org_id: i64, new: &NewProject) -> Result<Project> {
    if new.code.trim().is_empty() {
        return Err(CoreError::validation("project code is required"));
    }
    if new.name.trim().is_empty() {
        return Err(CoreError::validation("project name is required"));
    }

    let row = sqlx::query(
        r#"
        insert into projects (org_id, code, name, description, status)
        values ($1, $2, $3, $4, $5)
        returning *
        "#,
    )
    .bind(org_id)
    .bind(new.code.trim())
    .bind(new.name.trim())
    .bind(&new.description)
    .bind(&new.status)
    .fetch_one(&mut *conn)
    .await
    .map_err(CoreError::from)?;

    Project::from_row(&row).map_err(CoreError::from)
}

pub async fn update(
    conn: &mut PgConnection,
    org_id: i64,
    id: i64,
    patch: &ProjectPatch,
) -> Result<Project> {
    let row = sqlx::query(
        r#"
        update projects set
            code        = coalesce($3, code),
            name        = coalesce($4, name),
            description = coalesce($5, description),
            status      = coalesce($6, status),
            updated_at  = now()
        where id = $1 and org_id = $2
        returning *
        "#,
    )
    .bind(id)
    .bind(org_id)
    .bind(patch.code.as_deref().map(str::trim))
    .bind(&patch.name)
    .bind(&patch.description)
    .bind(&patch.status)
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?
    .ok_or(CoreError::NotFound)?;

    Project::from_row(&row).map_err(CoreError::from)
}

pub async fn delete(conn: &mut PgConnection, org_id: i64, id: i64) -> Result<()> {
    let result = sqlx::query("delete from projects where id = $1 and org_id = $2")
        .bind(id)
        .bind(org_id)
        .execute(&mut *conn)
        .await
        .map_err(CoreError::from)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }
    Ok(())
}
