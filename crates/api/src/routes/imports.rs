//! Spreadsheet ingestion endpoint

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use siteledger_core::auth::{AuthContext, Role};
use siteledger_core::CoreError;
use siteledger_importer::{engine, ImportOptions, ImportSummary, MappingDoc};

use crate::error::{ApiError, Result};
use crate::routes::MAX_UPLOAD_BYTES;
use crate::state::AppState;

const DEFAULT_MAX_ERRORS: u64 = 50;

const IMPORT_ROLES: &[Role] = &[Role::OrgAdmin, Role::ProjectAdmin];

#[derive(Debug, Serialize, ToSchema)]
pub struct ImportResponse {
    pub data: ImportSummary,
    pub meta: ImportMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImportMeta {
    /// RFC 3339 completion time
    pub timestamp: String,
    pub version: String,
}

/// Form fields collected from the multipart body.
#[derive(Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    site_id: Option<i64>,
    dry_run: bool,
    mapping: Option<String>,
    max_errors: u64,
}

/// Ingest an `.xlsx` workbook
///
/// Multipart fields: `file` (required, ≤ 20 MiB), `site_id` (required,
/// positive), `dry_run` (default false), `mapping` (path, default built-in),
/// `max_errors` (default 50). A dry run leaves the database untouched.
#[utoipa::path(
    post,
    path = "/imports/excel",
    tag = "imports",
    responses(
        (status = 200, description = "Import summary", body = ImportResponse),
        (status = 400, description = "Bad upload", body = crate::error::ErrorResponse),
        (status = 422, description = "Error budget exceeded", body = crate::error::ErrorResponse),
    )
)]
pub async fn upload_excel(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<AuthContext>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ImportResponse>> {
    ctx.require_any(IMPORT_ROLES)?;

    let multipart = multipart
        .map_err(|e| CoreError::validation(format!("expected a multipart form: {}", e)))?;
    let form = read_form(multipart).await?;

    let (filename, bytes) = form
        .file
        .ok_or_else(|| CoreError::validation("file field is required"))?;
    if !filename.to_ascii_lowercase().ends_with(".xlsx") {
        return Err(CoreError::validation("file must be an .xlsx workbook").into());
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CoreError::validation("file exceeds the 20 MiB limit").into());
    }

    let site_id = form
        .site_id
        .ok_or_else(|| CoreError::validation("site_id field is required"))?;
    if site_id <= 0 {
        return Err(CoreError::validation("site_id must be positive").into());
    }

    let mapping = match &form.mapping {
        Some(path) => MappingDoc::load(path).map_err(ApiError::from)?,
        None => MappingDoc::builtin(),
    };

    let opts = ImportOptions {
        org_id: ctx.org_id,
        site_id,
        dry_run: form.dry_run,
        max_errors: form.max_errors,
    };

    info!(
        org_id = ctx.org_id,
        site_id,
        dry_run = form.dry_run,
        size = bytes.len(),
        file = %filename,
        "excel import requested"
    );

    let mut session = state.db.tenant_session(ctx.org_id).await?;
    let summary = engine::run(session.conn(), &mapping, &bytes, &opts)
        .await
        .map_err(ApiError::from)?;

    Ok(Json(ImportResponse {
        data: summary,
        meta: ImportMeta {
            timestamp: Utc::now().to_rfc3339(),
            version: state.version.clone(),
        },
    }))
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm> {
    let mut form = UploadForm {
        max_errors: DEFAULT_MAX_ERRORS,
        ..UploadForm::default()
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CoreError::validation(format!("bad multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| CoreError::validation(format!("cannot read file: {}", e)))?;
                form.file = Some((filename, bytes.to_vec()));
            }
            "site_id" => {
                let text = field_text(field).await?;
                form.site_id = Some(
                    text.trim()
                        .parse::<i64>()
                        .map_err(|_| CoreError::validation("site_id must be an integer"))?,
                );
            }
            "dry_run" => {
                let text = field_text(field).await?;
                form.dry_run = match text.trim().to_ascii_lowercase().as_str() {
                    "true" => true,
                    "false" | "" => false,
                    other => {
                        return Err(CoreError::validation(format!(
                            "dry_run must be true or false, got {:?}",
                            other
                        ))
                        .into())
                    }
                };
            }
            "mapping" => {
                let text = field_text(field).await?;
                if !text.trim().is_empty() {
                    form.mapping = Some(text.trim().to_string());
                }
            }
            "max_errors" => {
                let text = field_text(field).await?;
                let value = text
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| CoreError::validation("max_errors must be a positive integer"))?;
                if value == 0 {
                    return Err(
                        CoreError::validation("max_errors must be a positive integer").into()
                    );
                }
                form.max_errors = value;
            }
            // Unknown form fields are ignored.
            _ => {}
        }
    }

    Ok(form)
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| CoreError::validation(format!("bad multipart field: {}", e)).into())
}
