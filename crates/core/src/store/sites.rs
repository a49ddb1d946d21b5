//! Site store

use serde::Deserialize;
use sqlx::{FromRow, PgConnection};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};
use crate::models::Site;
use crate::store::{order_by_clause, window_total, ListParams, Page, PageMeta};

const SITE_SORT: &[&str] = &["id", "name", "code", "city", "country", "created_at", "updated_at"];

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewSite {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SitePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

pub async fn list(
    conn: &mut PgConnection,
    org_id: i64,
    params: &ListParams,
) -> Result<Page<Site>> {
    let order = order_by_clause(params.sort.as_deref(), SITE_SORT, "id asc")?;
    let (limit, offset) = (params.limit(), params.offset());

    let sql = format!(
        r#"
        select *, count(*) over () as total
        from sites
        where org_id = $1
          and ($2::text is null or name ilike '%' || $2 || '%')
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
        .map(Site::from_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CoreError::from)?;

    Ok(Page {
        data,
        page: PageMeta { limit, offset, total },
    })
}

pub async fn get(conn: &mut PgConnection, org_id: i64, id: i64) -> Result<Site> {
    let row = sqlx::query("select * from sites where id = $1 and org_id = $2")
        .bind(id)
        .bind(org_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::NotFound)?;
    Site::from_row(&row).map_err(CoreError::from)
}

pub async fn create(conn: &mut PgConnection, org_id: i64, new: &NewSite) -> Result<Site> {
    if new.name.trim().is_empty() {
        return Err(CoreError::validation("site name is required"));
    }

    let row = sqlx::query(
        r#"
        insert into sites (org_id, name, code, address, city, country)
        values ($1, $2, $3, $4, $5, $6)
        returning *
        "#,
    )
    .bind(org_id)
    .bind(new.name.trim())
    .bind(&new.code)
    .bind(&new.address)
    .bind(&new.city)
    .bind(&new.country)
    .fetch_one(&mut *conn)
    .await
    .map_err(CoreError::from)?;

    Site::from_row(&row).map_err(CoreError::from)
}

pub async fn update(
    conn: &mut PgConnection,
    org_id: i64,
    id: i64,
    patch: &SitePatch,
) -> Result<Site> {
    let row = sqlx::query(
        r#"
        update sites set
            name       = coalesce($3, name),
            code       = coalesce($4, code),
            address    = coalesce($5, address),
            city       = coalesce($6, city),
            country    = coalesce($7, country),
            updated_at = now()
        where id = $1 and org_id = $2
        returning *
        "#,
    )
    .bind(id)
    .bind(org_id)
    .bind(&patch.name)
    .bind(&patch.code)
    .bind(&patch.address)
    .bind(&patch.city)
    .bind(&patch.country)
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?
    .ok_or(CoreError::NotFound)?;

    Site::from_row(&row).map_err(CoreError::from)
}

pub async fn delete(conn: &mut PgConnection, org_id: i64, id: i64) -> Result<()> {
    let result = sqlx::query("delete from sites where id = $1 and org_id = $2")
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
