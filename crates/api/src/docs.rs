//! OpenAPI document
//!
//! Served behind the `DOCS_ENABLED` flag: Swagger UI under `/docs`, the
//! YAML document at `/openapi.yaml`.

use utoipa::OpenApi;

use siteledger_core::models::asset::{
    Asset, AssetPatch, NewAsset, SiteAssetCategory, SwitchAsset, SwitchPayload, VlanAsset,
    VlanPayload,
};
use siteledger_core::models::{Item, Organization, OrgStats, Project, Site, User, Vendor};
use siteledger_core::store::PageMeta;

use crate::routes;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "SiteLedger API",
        description = "Multi-tenant asset inventory service",
    ),
    paths(
        routes::health::health_check,
        routes::health::db_ping,
        routes::auth::login,
        routes::auth::get_profile,
        routes::auth::update_profile,
        routes::auth::change_password,
        routes::organizations::list_organizations,
        routes::organizations::create_organization,
        routes::organizations::get_organization,
        routes::organizations::update_organization,
        routes::organizations::delete_organization,
        routes::organizations::organization_stats,
        routes::users::list_users,
        routes::users::create_user,
        routes::users::get_user,
        routes::users::update_user,
        routes::users::delete_user,
        routes::sites::list_sites,
        routes::sites::create_site,
        routes::sites::get_site,
        routes::sites::update_site,
        routes::sites::delete_site,
        routes::vendors::list_vendors,
        routes::vendors::create_vendor,
        routes::vendors::get_vendor,
        routes::vendors::update_vendor,
        routes::vendors::delete_vendor,
        routes::projects::list_projects,
        routes::projects::create_project,
        routes::projects::get_project,
        routes::projects::update_project,
        routes::projects::delete_project,
        routes::items::list_items,
        routes::items::create_item,
        routes::items::get_item,
        routes::items::update_item,
        routes::items::delete_item,
        routes::assets::list_assets,
        routes::assets::create_asset,
        routes::assets::get_asset,
        routes::assets::update_asset,
        routes::assets::delete_asset,
        routes::assets::list_switches,
        routes::assets::list_vlans,
        routes::assets::site_categories,
        routes::imports::upload_excel,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        routes::health::HealthResponse,
        routes::auth::LoginRequest,
        routes::auth::LoginResponse,
        routes::auth::ChangePasswordRequest,
        routes::imports::ImportResponse,
        routes::imports::ImportMeta,
        siteledger_importer::ImportSummary,
        siteledger_importer::SheetSummary,
        siteledger_importer::ErrorSample,
        siteledger_core::auth::Role,
        siteledger_core::store::orgs::NewOrganization,
        siteledger_core::store::orgs::OrganizationPatch,
        siteledger_core::store::users::NewUser,
        siteledger_core::store::users::UserPatch,
        siteledger_core::store::users::ProfilePatch,
        siteledger_core::store::sites::NewSite,
        siteledger_core::store::sites::SitePatch,
        siteledger_core::store::vendors::NewVendor,
        siteledger_core::store::vendors::VendorPatch,
        siteledger_core::store::projects::NewProject,
        siteledger_core::store::projects::ProjectPatch,
        siteledger_core::store::items::NewItem,
        siteledger_core::store::items::ItemPatch,
        PageMeta,
        Organization,
        OrgStats,
        User,
        Site,
        Vendor,
        Project,
        Item,
        Asset,
        NewAsset,
        AssetPatch,
        SwitchPayload,
        VlanPayload,
        SwitchAsset,
        VlanAsset,
        SiteAssetCategory,
    )),
    tags(
        (name = "health", description = "Liveness and reachability"),
        (name = "auth", description = "Login and self-service"),
        (name = "organizations", description = "Tenant management"),
        (name = "users", description = "Account management"),
        (name = "sites", description = "Sites"),
        (name = "vendors", description = "Vendors"),
        (name = "projects", description = "Projects"),
        (name = "items", description = "Generic inventory"),
        (name = "assets", description = "Asset catalog"),
        (name = "imports", description = "Spreadsheet ingestion"),
    )
)]
pub struct ApiDoc;

/// `GET /openapi.yaml`
pub async fn openapi_yaml() -> axum::response::Response {
    use axum::response::IntoResponse;

    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => ([("Content-Type", "application/yaml")], yaml).into_response(),
        Err(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
