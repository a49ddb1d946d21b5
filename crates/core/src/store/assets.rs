//! Asset store: the polymorphic record, its subtypes, and the counters

use sqlx::{Connection, FromRow, PgConnection, Row};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::models::asset::{
    Asset, AssetPatch, NewAsset, SiteAssetCategory, SwitchAsset, SwitchPayload, VlanAsset,
    VlanPayload,
};
use crate::store::{order_by_clause, window_total, ListParams, Page, PageMeta};

const ASSET_SORT: &[&str] = &["id", "name", "asset_type", "vendor", "created_at", "updated_at"];
const SWITCH_SORT: &[&str] = &[
    "id",
    "name",
    "asset_type",
    "vendor",
    "created_at",
    "updated_at",
    "ports_total",
];
const VLAN_SORT: &[&str] = &[
    "id",
    "name",
    "asset_type",
    "vendor",
    "created_at",
    "updated_at",
    "vlan_id",
];

/// Create an asset and, when a sub-payload is present, its subtype row in
/// the same transaction. A failed subtype write rolls back the asset.
pub async fn create(conn: &mut PgConnection, org_id: i64, new: &NewAsset) -> Result<Asset> {
    if new.site_id <= 0 {
        return Err(CoreError::validation("site_id must be positive"));
    }
    if new.asset_type.trim().is_empty() {
        return Err(CoreError::validation("asset_type is required"));
    }
    ensure_extras_map(new.extras.as_ref())?;

    let mut tx = conn.begin().await?;

    ensure_site(&mut tx, org_id, new.site_id).await?;

    let row = sqlx::query(
        r#"
        insert into assets
            (org_id, site_id, asset_type, name, vendor, model, serial,
             mgmt_ip, status, notes, extras)
        values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, coalesce($11, '{}'::jsonb))
        returning *
        "#,
    )
    .bind(org_id)
    .bind(new.site_id)
    .bind(new.asset_type.trim())
    .bind(&new.name)
    .bind(&new.vendor)
    .bind(&new.model)
    .bind(&new.serial)
    .bind(new.mgmt_ip)
    .bind(&new.status)
    .bind(&new.notes)
    .bind(&new.extras)
    .fetch_one(&mut *tx)
    .await
    .map_err(CoreError::from)?;

    let asset = Asset::from_row(&row).map_err(CoreError::from)?;

    if let Some(switch) = &new.switch {
        upsert_switch(&mut tx, asset.id, switch).await?;
    }
    if let Some(vlan) = &new.vlan {
        upsert_vlan(&mut tx, &asset, vlan).await?;
    }

    tx.commit().await?;
    debug!(asset_id = asset.id, org_id, "asset created");
    Ok(asset)
}

/// Fetch one asset within the context organization.
pub async fn get(conn: &mut PgConnection, org_id: i64, id: i64) -> Result<Asset> {
    let row = sqlx::query("select * from assets where id = $1 and org_id = $2")
        .bind(id)
        .bind(org_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::NotFound)?;
    Asset::from_row(&row).map_err(CoreError::from)
}

/// Partial update. Only provided fields change; `extras` merges into the
/// stored map; subtype payloads upsert by asset id. The organization is part
/// of the WHERE clause, so a known row id in another tenant stays unreachable.
pub async fn update(
    conn: &mut PgConnection,
    org_id: i64,
    id: i64,
    patch: &AssetPatch,
) -> Result<Asset> {
    ensure_extras_map(patch.extras.as_ref())?;

    let mut tx = conn.begin().await?;

    if let Some(site_id) = patch.site_id {
        ensure_site(&mut tx, org_id, site_id).await?;
    }

    let row = sqlx::query(
        r#"
        update assets set
            site_id    = coalesce($3, site_id),
            asset_type = coalesce($4, asset_type),
            name       = coalesce($5, name),
            vendor     = coalesce($6, vendor),
            model      = coalesce($7, model),
            serial     = coalesce($8, serial),
            mgmt_ip    = coalesce($9, mgmt_ip),
            status     = coalesce($10, status),
            notes      = coalesce($11, notes),
            extras     = extras || coalesce($12, '{}'::jsonb),
            updated_at = now()
        where id = $1 and org_id = $2
        returning *
        "#,
    )
    .bind(id)
    .bind(org_id)
    .bind(patch.site_id)
    .bind(patch.asset_type.as_deref().map(str::trim))
    .bind(&patch.name)
    .bind(&patch.vendor)
    .bind(&patch.model)
    .bind(&patch.serial)
    .bind(patch.mgmt_ip)
    .bind(&patch.status)
    .bind(&patch.notes)
    .bind(&patch.extras)
    .fetch_optional(&mut *tx)
    .await
    .map_err(CoreError::from)?
    .ok_or(CoreError::NotFound)?;

    let asset = Asset::from_row(&row).map_err(CoreError::from)?;

    if let Some(switch) = &patch.switch {
        upsert_switch(&mut tx, asset.id, switch).await?;
    }
    if let Some(vlan) = &patch.vlan {
        upsert_vlan(&mut tx, &asset, vlan).await?;
    } else if patch.site_id.is_some() {
        // The VLAN uniqueness lives on denormalized coordinates; keep them
        // in step when the parent moves.
        sqlx::query(
            "update vlan_details set org_id = $2, site_id = $3 where asset_id = $1",
        )
        .bind(asset.id)
        .bind(asset.org_id)
        .bind(asset.site_id)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::from)?;
    }

    tx.commit().await?;
    debug!(asset_id = asset.id, org_id, "asset updated");
    Ok(asset)
}

/// Delete an asset. Subtype rows cascade; the counter trigger fires in the
/// same transaction as the delete.
pub async fn delete(conn: &mut PgConnection, org_id: i64, id: i64) -> Result<()> {
    let result = sqlx::query("delete from assets where id = $1 and org_id = $2")
        .bind(id)
        .bind(org_id)
        .execute(&mut *conn)
        .await
        .map_err(CoreError::from)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound);
    }
    debug!(asset_id = id, org_id, "asset deleted");
    Ok(())
}

/// List assets with filters, whitelist sort, and a windowed total.
pub async fn list(
    conn: &mut PgConnection,
    org_id: i64,
    params: &ListParams,
) -> Result<Page<Asset>> {
    let order = order_by_clause(params.sort.as_deref(), ASSET_SORT, "id asc")?;
    let (limit, offset) = (params.limit(), params.offset());

    let sql = format!(
        r#"
        select *, count(*) over () as total
        from assets
        where org_id = $1
          and ($2::bigint is null or site_id = $2)
          and ($3::text is null or asset_type = $3)
          and ($4::text is null or name ilike '%' || $4 || '%')
        order by {order}
        limit $5 offset $6
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(org_id)
        .bind(params.site_id)
        .bind(&params.asset_type)
        .bind(&params.q)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
        .map_err(CoreError::from)?;

    let mut total = window_total(&rows);
    if rows.is_empty() && offset > 0 {
        total = count_assets(conn, org_id, params).await?;
    }

    let data = rows
        .iter()
        .map(Asset::from_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CoreError::from)?;

    Ok(Page {
        data,
        page: PageMeta { limit, offset, total },
    })
}

async fn count_assets(conn: &mut PgConnection, org_id: i64, params: &ListParams) -> Result<i64> {
    let row = sqlx::query(
        r#"
        select count(*) as total
        from assets
        where org_id = $1
          and ($2::bigint is null or site_id = $2)
          and ($3::text is null or asset_type = $3)
          and ($4::text is null or name ilike '%' || $4 || '%')
        "#,
    )
    .bind(org_id)
    .bind(params.site_id)
    .bind(&params.asset_type)
    .bind(&params.q)
    .fetch_one(&mut *conn)
    .await
    .map_err(CoreError::from)?;
    Ok(row.get("total"))
}

/// Switch projection: assets joined with their switch rows.
pub async fn list_switches(
    conn: &mut PgConnection,
    org_id: i64,
    params: &ListParams,
) -> Result<Page<SwitchAsset>> {
    let order = order_by_clause(params.sort.as_deref(), SWITCH_SORT, "id asc")?;
    let (limit, offset) = (params.limit(), params.offset());

    let sql = format!(
        r#"
        select a.id, a.org_id, a.site_id, a.name, a.vendor, a.model, a.serial,
               a.mgmt_ip, a.status, a.created_at, a.updated_at,
               sd.ports_total, sd.poe, sd.uplink_info, sd.firmware,
               count(*) over () as total
        from assets a
        join switch_details sd on sd.asset_id = a.id
        where a.org_id = $1
          and ($2::bigint is null or a.site_id = $2)
          and ($3::text is null or a.name ilike '%' || $3 || '%')
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
        .map(SwitchAsset::from_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CoreError::from)?;

    Ok(Page {
        data,
        page: PageMeta { limit, offset, total },
    })
}

/// VLAN projection: assets joined with their VLAN rows.
pub async fn list_vlans(
    conn: &mut PgConnection,
    org_id: i64,
    params: &ListParams,
) -> Result<Page<VlanAsset>> {
    let order = order_by_clause(params.sort.as_deref(), VLAN_SORT, "id asc")?;
    let (limit, offset) = (params.limit(), params.offset());

    let sql = format!(
        r#"
        select a.id, a.org_id, a.site_id, a.name, a.status, a.created_at, a.updated_at,
               vd.vlan_id, vd.subnet, vd.gateway, vd.purpose,
               count(*) over () as total
        from assets a
        join vlan_details vd on vd.asset_id = a.id
        where a.org_id = $1
          and ($2::bigint is null or a.site_id = $2)
          and ($3::text is null or a.name ilike '%' || $3 || '%')
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
        .map(VlanAsset::from_row)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(CoreError::from)?;

    Ok(Page {
        data,
        page: PageMeta { limit, offset, total },
    })
}

/// Counter rows for one site, ordered by asset type.
pub async fn site_categories(
    conn: &mut PgConnection,
    org_id: i64,
    site_id: i64,
) -> Result<Vec<SiteAssetCategory>> {
    let rows = sqlx::query_as::<_, SiteAssetCategory>(
        r#"
        select org_id, site_id, asset_type, asset_count
        from site_asset_categories
        where org_id = $1 and site_id = $2
        order by asset_type
        "#,
    )
    .bind(org_id)
    .bind(site_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(CoreError::from)?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Natural-key lookups for the import pipeline
// ---------------------------------------------------------------------------

pub async fn find_by_serial(
    conn: &mut PgConnection,
    org_id: i64,
    site_id: i64,
    asset_type: &str,
    serial: &str,
) -> Result<Option<i64>> {
    let row = sqlx::query(
        r#"
        select id from assets
        where org_id = $1 and site_id = $2 and asset_type = $3 and serial = $4
        "#,
    )
    .bind(org_id)
    .bind(site_id)
    .bind(asset_type)
    .bind(serial)
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?;
    Ok(row.map(|r| r.get("id")))
}

pub async fn find_by_name(
    conn: &mut PgConnection,
    org_id: i64,
    site_id: i64,
    asset_type: &str,
    name: &str,
) -> Result<Option<i64>> {
    let row = sqlx::query(
        r#"
        select id from assets
        where org_id = $1 and site_id = $2 and asset_type = $3 and name = $4
        order by id
        limit 1
        "#,
    )
    .bind(org_id)
    .bind(site_id)
    .bind(asset_type)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?;
    Ok(row.map(|r| r.get("id")))
}

pub async fn find_by_mgmt_ip(
    conn: &mut PgConnection,
    org_id: i64,
    site_id: i64,
    asset_type: &str,
    mgmt_ip: std::net::IpAddr,
) -> Result<Option<i64>> {
    let row = sqlx::query(
        r#"
        select id from assets
        where org_id = $1 and site_id = $2 and asset_type = $3 and mgmt_ip = $4
        order by id
        limit 1
        "#,
    )
    .bind(org_id)
    .bind(site_id)
    .bind(asset_type)
    .bind(mgmt_ip)
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?;
    Ok(row.map(|r| r.get("id")))
}

/// VLAN sheets dedupe on the subtype's vlan id.
pub async fn find_by_vlan_id(
    conn: &mut PgConnection,
    org_id: i64,
    site_id: i64,
    vlan_id: i32,
) -> Result<Option<i64>> {
    let row = sqlx::query(
        r#"
        select asset_id from vlan_details
        where org_id = $1 and site_id = $2 and vlan_id = $3
        "#,
    )
    .bind(org_id)
    .bind(site_id)
    .bind(vlan_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(CoreError::from)?;
    Ok(row.map(|r| r.get("asset_id")))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Extras merge key-by-key into a JSONB map; anything but an object cannot
/// merge.
fn ensure_extras_map(extras: Option<&serde_json::Value>) -> Result<()> {
    match extras {
        Some(value) if !value.is_object() => {
            Err(CoreError::validation("extras must be a JSON object"))
        }
        _ => Ok(()),
    }
}

/// The site must exist inside the context organization before an asset may
/// point at it; the foreign key alone would accept another tenant's site.
async fn ensure_site(tx: &mut sqlx::Transaction<'_, sqlx::Postgres>, org_id: i64, site_id: i64) -> Result<()> {
    let found = sqlx::query("select 1 from sites where id = $1 and org_id = $2")
        .bind(site_id)
        .bind(org_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(CoreError::from)?;
    if found.is_none() {
        return Err(CoreError::validation(format!(
            "site {} does not exist in this organization",
            site_id
        )));
    }
    Ok(())
}

async fn upsert_switch(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    asset_id: i64,
    switch: &SwitchPayload,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into switch_details (asset_id, ports_total, poe, uplink_info, firmware)
        values ($1, $2, $3, $4, $5)
        on conflict (asset_id) do update set
            ports_total = coalesce(excluded.ports_total, switch_details.ports_total),
            poe         = coalesce(excluded.poe, switch_details.poe),
            uplink_info = coalesce(excluded.uplink_info, switch_details.uplink_info),
            firmware    = coalesce(excluded.firmware, switch_details.firmware)
        "#,
    )
    .bind(asset_id)
    .bind(switch.ports_total)
    .bind(switch.poe)
    .bind(&switch.uplink_info)
    .bind(&switch.firmware)
    .execute(&mut **tx)
    .await
    .map_err(CoreError::from)?;
    Ok(())
}

async fn upsert_vlan(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    asset: &Asset,
    vlan: &VlanPayload,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into vlan_details (asset_id, org_id, site_id, vlan_id, subnet, gateway, purpose)
        values ($1, $2, $3, $4, $5, $6, $7)
        on conflict (asset_id) do update set
            org_id  = excluded.org_id,
            site_id = excluded.site_id,
            vlan_id = excluded.vlan_id,
            subnet  = coalesce(excluded.subnet, vlan_details.subnet),
            gateway = coalesce(excluded.gateway, vlan_details.gateway),
            purpose = coalesce(excluded.purpose, vlan_details.purpose)
        "#,
    )
    .bind(asset.id)
    .bind(asset.org_id)
    .bind(asset.site_id)
    .bind(vlan.vlan_id)
    .bind(vlan.subnet)
    .bind(vlan.gateway)
    .bind(&vlan.purpose)
    .execute(&mut **tx)
    .await
    .map_err(CoreError::from)?;
    Ok(())
}
