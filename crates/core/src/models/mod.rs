//! Domain models
//!
//! Row types are `sqlx::FromRow` and serialize straight onto the wire;
//! optional columns are omitted when absent.

pub mod asset;
pub mod item;
pub mod org;
pub mod project;
pub mod site;
pub mod user;
pub mod vendor;

pub use asset::{
    Asset, AssetPatch, NewAsset, SiteAssetCategory, SwitchAsset, SwitchPayload, VlanAsset,
    VlanPayload,
};
pub use item::Item;
pub use org::{Organization, OrgStats};
pub use project::Project;
pub use site::Site;
pub use user::User;
pub use vendor::Vendor;
