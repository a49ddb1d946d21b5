use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use utoipa::ToSchema;

/// The polymorphic asset record. Type-specific structure lives in the
/// subtype rows (`switch_details`, `vlan_details`) and in `extras`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Asset {
    pub id: i64,
    pub org_id: i64,
    pub site_id: i64,
    pub asset_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub mgmt_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[schema(value_type = Object)]
    pub extras: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Switch-specific fields, written when `asset_type = "switch"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SwitchPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports_total: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poe: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uplink_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
}

impl SwitchPayload {
    pub fn is_empty(&self) -> bool {
        self.ports_total.is_none()
            && self.poe.is_none()
            && self.uplink_info.is_none()
            && self.firmware.is_none()
    }
}

/// VLAN-specific fields. `(org, site, vlan_id)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VlanPayload {
    pub vlan_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub subnet: Option<IpNetwork>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub gateway: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

/// Create payload. `site_id` and `asset_type` are required; everything else
/// is omitted when absent.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewAsset {
    pub site_id: i64,
    pub asset_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub mgmt_ip: Option<IpAddr>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub extras: Option<serde_json::Value>,
    #[serde(default)]
    pub switch: Option<SwitchPayload>,
    #[serde(default)]
    pub vlan: Option<VlanPayload>,
}

/// Partial update. Absent fields keep their stored value; `extras` merges
/// key-by-key into the stored map. Subtype payloads upsert by asset id.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AssetPatch {
    #[serde(default)]
    pub site_id: Option<i64>,
    #[serde(default)]
    pub asset_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub mgmt_ip: Option<IpAddr>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub extras: Option<serde_json::Value>,
    #[serde(default)]
    pub switch: Option<SwitchPayload>,
    #[serde(default)]
    pub vlan: Option<VlanPayload>,
}

impl AssetPatch {
    pub fn is_empty(&self) -> bool {
        self.site_id.is_none()
            && self.asset_type.is_none()
            && self.name.is_none()
            && self.vendor.is_none()
            && self.model.is_none()
            && self.serial.is_none()
            && self.mgmt_ip.is_none()
            && self.status.is_none()
            && self.notes.is_none()
            && self.extras.is_none()
            && self.switch.is_none()
            && self.vlan.is_none()
    }
}

/// Switch projection: asset columns joined with the subtype row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct SwitchAsset {
    pub id: i64,
    pub org_id: i64,
    pub site_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub mgmt_ip: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports_total: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poe: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uplink_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// VLAN projection: asset columns joined with the subtype row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct VlanAsset {
    pub id: i64,
    pub org_id: i64,
    pub site_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub vlan_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub subnet: Option<IpNetwork>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub gateway: Option<IpAddr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A counter row. Derived state: always equals the number of assets with
/// the same coordinates, maintained by the database triggers.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct SiteAssetCategory {
    pub org_id: i64,
    pub site_id: i64,
    pub asset_type: String,
    pub asset_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_asset_minimal_payload() {
        let asset: NewAsset =
            serde_json::from_str(r#"{"site_id":1,"asset_type":"switch"}"#).unwrap();
        assert_eq!(asset.site_id, 1);
        assert_eq!(asset.asset_type, "switch");
        assert!(asset.serial.is_none());
        assert!(asset.switch.is_none());
    }

    #[test]
    fn test_new_asset_parses_mgmt_ip() {
        let asset: NewAsset = serde_json::from_str(
            r#"{"site_id":1,"asset_type":"switch","mgmt_ip":"10.1.2.3"}"#,
        )
        .unwrap();
        assert_eq!(asset.mgmt_ip, Some("10.1.2.3".parse().unwrap()));

        let bad = serde_json::from_str::<NewAsset>(
            r#"{"site_id":1,"asset_type":"switch","mgmt_ip":"not-an-ip"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_vlan_payload_parses_subnet() {
        let vlan: VlanPayload =
            serde_json::from_str(r#"{"vlan_id":120,"subnet":"10.20.0.0/24","gateway":"10.20.0.1"}"#)
                .unwrap();
        assert_eq!(vlan.vlan_id, 120);
        assert_eq!(vlan.subnet.unwrap().prefix(), 24);
    }

    #[test]
    fn test_partial_subtype_payloads_deserialize() {
        // Sub-payloads follow the same omit-when-absent wire shape as the
        // asset itself.
        let switch: SwitchPayload = serde_json::from_str(r#"{"ports_total":48}"#).unwrap();
        assert_eq!(switch.ports_total, Some(48));
        assert!(switch.poe.is_none());
        assert!(!switch.is_empty());

        let vlan: VlanPayload = serde_json::from_str(r#"{"vlan_id":7}"#).unwrap();
        assert_eq!(vlan.vlan_id, 7);
        assert!(vlan.subnet.is_none());
        assert!(vlan.gateway.is_none());
    }

    #[test]
    fn test_patch_empty_detection() {
        let patch: AssetPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());

        let patch: AssetPatch = serde_json::from_str(r#"{"name":"core-sw-01"}"#).unwrap();
        assert!(!patch.is_empty());
    }
}
