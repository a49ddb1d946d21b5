//! Vendor store

use serde::Deserialize;
use sqlx::{FromRow, PgConnection};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};
use crate::models::Vendor;
use crate::store::{order_by_clause, window_total, ListParams, Page, PageMeta};

const VENDOR_SORT: &[&str] = &["id", "name", "created_at", "updated_at"];

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewVendor {
    pub name: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct VendorPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

pub async fn list(
    conn: &mut PgConnection,
    org_id: i64,
    params: &ListParams,
) -> Result<Page<Vendor>> {
    let order = order_by_clause(params.sort.as_deref(), VENDOR_SORT, "id asc")?;
    let (limit, offset) = (params.limit(), params.offset());

    let sql = format!(
        r#"
        select *, count(*) over () as total
        from vendors
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
        .map(Vendor::from_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CoreError::from)?;

    Ok(Page {
        data,
        page: PageMeta { limit, offset, total },
    })
}

pub async fn get(conn: &mut PgConnection, org_id: i64, id: i64) -> Result<Vendor> {
    let row = sqlx::query("select * from vendors where id = $1 and org_id = $2")
        .bind(id)
        .bind(org_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::NotFound)?;
    Vendor::from_row(&row).map_err(CoreError::from)
}

pub async fn create(conn: &mut PgConnection, org_id: i64, new: &NewVendor) -> Result<Vendor> {
    if new.name.trim().is_empty() {
        return Err(CoreError::validation("vendor name is required"));
    }

    let row = sqlx::query(
        r#"
        insert into vendors (org_id, name, contact_email, phone, website)
        values ($1, $2, $3, $4, $5)
        returning *
        "#,
    )
    .bind(org_id)
    .bind(new.name.trim())
    .bind(&new.contact_email)
    .bind(&new.phone)
    .bind(&new.website)
    .fetch_one(&mut *conn)
    .await
    .map_err(CoreError::from)?;

    Vendor::from_row(&row).map_err(CoreError::from)
}

pub async fn update(
    conn: &mut PgConnection,
    org_id: i64,
    id: i64,
    patch: &VendorPatch,
) -> Result<Vendor> {
    let row = sqlx::query(
        r#"
        update vendors set
            name          = coalesce($3, name),
            contact_email = coalesce($4, contact_email),
            phone         = coalesce($5, phone),
            website       = coalesce($6, website),
            updated_at    = now()
        where id = $1 and org_id = $2
        returning *
        "#,
    )
    .bind(id)
    .bind(org_id)
    .bind(&patch.name)
    .bind(&patch.contact_email)
    .bind(&patch.phone)
    .bind(&patch.website)
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?
    .ok_or(CoreError::NotFound)?;

    Vendor::from_row(&row).map_err(CoreError::from)
}

pub async fn delete(conn: &mut PgConnection, org_id: i64, id: i64) -> Result<()> {
    let result = sqlx::query("delete from vendors where id = $1 and org_id = $2")
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
