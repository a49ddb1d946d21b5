//! Organization store. All of these operations are reserved to the main
//! tenant; the handlers enforce that before calling in.

use serde::Deserialize;
use sqlx::{Connection, FromRow, PgConnection, Row};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};
use crate::models::{Organization, OrgStats};
use crate::store::{order_by_clause, window_total, ListParams, Page, PageMeta};
use crate::MAIN_TENANT_ORG_ID;

const ORG_SORT: &[&str] = &["id", "name", "created_at", "updated_at"];

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewOrganization {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct OrganizationPatch {
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn list(conn: &mut PgConnection, params: &ListParams) -> Result<Page<Organization>> {
    let order = order_by_clause(params.sort.as_deref(), ORG_SORT, "id asc")?;
    let (limit, offset) = (params.limit(), params.offset());

    let sql = format!(
        r#"
        select *, count(*) over () as total
        from organizations
        where ($1::text is null or name ilike '%' || $1 || '%')
        order by {order}
        limit $2 offset $3
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(&params.q)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
        .map_err(CoreError::from)?;

    let total = window_total(&rows);
    let data = rows
        .iter()
        .map(Organization::from_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CoreError::from)?;

    Ok(Page {
        data,
        page: PageMeta { limit, offset, total },
    })
}

pub async fn get(conn: &mut PgConnection, id: i64) -> Result<Organization> {
    let row = sqlx::query("select * from organizations where id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::NotFound)?;
    Organization::from_row(&row).map_err(CoreError::from)
}

pub async fn create(conn: &mut PgConnection, new: &NewOrganization) -> Result<Organization> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(CoreError::validation("organization name is required"));
    }

    let row = sqlx::query("insert into organizations (name) values ($1) returning *")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(CoreError::from)?;

    let org = Organization::from_row(&row).map_err(CoreError::from)?;
    info!(org_id = org.id, "organization created");
    Ok(org)
}

pub async fn update(
    conn: &mut PgConnection,
    id: i64,
    patch: &OrganizationPatch,
) -> Result<Organization> {
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(CoreError::validation("organization name cannot be empty"));
        }
    }

    let row = sqlx::query(
        r#"
        update organizations set
            name = coalesce($2, name),
            updated_at = now()
        where id = $1
        returning *
        "#,
    )
    .bind(id)
    .bind(patch.name.as_deref().map(str::trim))
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?
    .ok_or(CoreError::NotFound)?;

    Organization::from_row(&row).map_err(CoreError::from)
}

/// Delete an organization. The main tenant is never deletable, and an
/// organization with any dependent row is kept until its data is gone.
pub async fn delete(conn: &mut PgConnection, id: i64) -> Result<()> {
    if id == MAIN_TENANT_ORG_ID {
        return Err(CoreError::CannotDeleteMainTenant);
    }

    let mut tx = conn.begin().await?;

    let stats = stats_inner(&mut tx, id).await?;
    if stats.users + stats.sites + stats.vendors + stats.projects + stats.items > 0
        || asset_count(&mut tx, id).await? > 0
    {
        return Err(CoreError::CannotDeleteOrgWithData);
    }

    let result = sqlx::query("delete from organizations where id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::from)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }

    tx.commit().await?;
    debug!(org_id = id, "organization deleted");
    Ok(())
}

/// Row counts for one organization.
pub async fn stats(conn: &mut PgConnection, id: i64) -> Result<OrgStats> {
    // 404 before counting zeros for a nonexistent org.
    get(conn, id).await?;
    let mut tx = conn.begin().await?;
    let stats = stats_inner(&mut tx, id).await?;
    tx.commit().await?;
    Ok(stats)
}

async fn stats_inner(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, id: i64) -> Result<OrgStats> {
    let row = sqlx::query(
        r#"
        select
            (select count(*) from users where org_id = $1)    as users,
            (select count(*) from sites where org_id = $1)    as sites,
            (select count(*) from vendors where org_id = $1)  as vendors,
            (select count(*) from projects where org_id = $1) as projects,
            (select count(*) from items where org_id = $1)    as items
        "#,
    )
    .bind(id)
    .fetch_one(&mut **tx)
    .await
    .map_err(CoreError::from)?;

    Ok(OrgStats {
        org_id: id,
        users: row.get("users"),
        sites: row.get("sites"),
        vendors: row.get("vendors"),
        projects: row.get("projects"),
        items: row.get("items"),
    })
}

async fn asset_count(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, id: i64) -> Result<i64> {
    let row = sqlx::query("select count(*) as n from assets where org_id = $1")
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map_err(CoreError::from)?;
    Ok(row.get("n"))
}
