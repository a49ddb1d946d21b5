//! Generic inventory items. `asset_tag` is globally unique; violations
//! surface as `duplicate_asset_tag`.

use serde::Deserialize;
use sqlx::{FromRow, PgConnection};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};
use crate::models::Item;
use crate::store::{order_by_clause, window_total, ListParams, Page, PageMeta};

const ITEM_SORT: &[&str] = &[
    "id",
    "asset_tag",
    "name",
    "category",
    "status",
    "created_at",
    "updated_at",
];

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewItem {
    pub asset_tag: String,
    pub name: String,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<i64>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub purchase_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ItemPatch {
    #[serde(default)]
    pub asset_tag: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub vendor_id: Option<i64>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub purchase_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn list(
    conn: &mut PgConnection,
    org_id: i64,
    params: &ListParams,
) -> Result<Page<Item>> {
    let order = order_by_clause(params.sort.as_deref(), ITEM_SORT, "id asc")?;
    let (limit, offset) = (params.limit(), params.offset());

    let sql = format!(
        r#"
        select *, count(*) over () as total
        from items
        where org_id = $1
          and ($2::bigint is null or site_id = $2)
          and ($3::text is null or name ilike '%' || $3 || '%' or asset_tag ilike '%' || $3 || '%')
        order by {order}
        limit $4 offset $5
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(org_id)
        .bind(params.site_id)
        .bind(&params.q)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
        .map_err(CoreError::from)?;

    let total = window_total(&rows);
    let data = rows
        .iter()
        .map(Item::from_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CoreError::from)?;

    Ok(Page {
        data,
        page: PageMeta { limit, offset, total },
    })
}

pub async fn get(conn: &mut PgConnection, org_id: i64, id: i64) -> Result<Item> {
    let row = sqlx::query("select * from items where id = $1 and org_id = $2")
        .bind(id)
        .bind(org_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::NotFound)?;
    Item::from_row(&row).map_err(CoreError::from)
}

pub async fn create(conn: &mut PgConnection, org_id: i64, new: &NewItem) -> Result<Item> {
    if new.asset_tag.trim().is_empty() {
        return Err(CoreError::validation("asset_tag is required"));
    }
    if new.name.trim().is_empty() {
        return Err(CoreError::validation("item name is required"));
    }

    let row = sqlx::query(
        r#"
        insert into items
            (org_id, site_id, asset_tag, name, category, vendor_id, project_id,
             status, purchase_date, notes)
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        returning *
        "#,
    )
    .bind(org_id)
    .bind(new.site_id)
    .bind(new.asset_tag.trim())
    .bind(new.name.trim())
    .bind(&new.category)
    .bind(new.vendor_id)
    .bind(new.project_id)
    .bind(&new.status)
    .bind(new.purchase_date)
    .bind(&new.notes)
    .fetch_one(&mut *conn)
    .await
    .map_err(CoreError::from)?;

    Item::from_row(&row).map_err(CoreError::from)
}

pub async fn update(
    conn: &mut PgConnection,
    org_id: i64,
    id: i64,
    patch: &ItemPatch,
) -> Result<Item> {
    let row = sqlx::query(
        r#"
        update items set
            asset_tag     = coalesce($3, asset_tag),
            name          = coalesce($4, name),
            site_id       = coalesce($5, site_id),
            category      = coalesce($6, category),
            vendor_id     = coalesce($7, vendor_id),
            project_id    = coalesce($8, project_id),
            status        = coalesce($9, status),
            purchase_date = coalesce($10, purchase_date),
            notes         = coalesce($11, notes),
            updated_at    = now()
        where id = $1 and org_id = $2
        returning *
        "#,
    )
    .bind(id)
    .bind(org_id)
    .bind(patch.asset_tag.as_deref().map(str::trim))
    .bind(&patch.name)
    .bind(patch.site_id)
    .bind(&patch.category)
    .bind(patch.vendor_id)
    .bind(patch.project_id)
    .bind(&patch.status)
    .bind(patch.purchase_date)
    .bind(&patch.notes)
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?
    .ok_or(CoreError::NotFound)?;

    Item::from_row(&row).map_err(CoreError::from)
}

pub async fn delete(conn: &mut PgConnection, org_id: i64, id: i64) -> Result<()> {
    let result = sqlx::query("delete from items where id = $1 and org_id = $2")
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
