//! Error types shared by the store layer and the import pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Resource not found")]
    NotFound,

    #[error("Duplicate record")]
    Duplicate,

    #[error("Asset tag already exists")]
    DuplicateAssetTag,

    #[error("Project code already exists for this organization")]
    DuplicateProjectCode,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Operating on another organization requires the main tenant")]
    ForbiddenOrgChange,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Cannot remove or deactivate the last active organization admin")]
    CannotDeleteLastAdmin,

    #[error("The main tenant cannot be deleted")]
    CannotDeleteMainTenant,

    #[error("Organization still owns data and cannot be deleted")]
    CannotDeleteOrgWithData,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Unique-constraint names from the migrations, mapped to their semantic
/// duplicate errors. Anything else unique-violating maps to plain `duplicate`.
const ASSET_TAG_CONSTRAINT: &str = "items_asset_tag_key";
const PROJECT_CODE_CONSTRAINT: &str = "projects_org_id_code_key";

impl CoreError {
    /// Stable machine code for the error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::InvalidConfig { .. } => "internal_error",
            Self::Validation(_) => "validation_error",
            Self::NotFound => "not_found",
            Self::Duplicate => "duplicate",
            Self::DuplicateAssetTag => "duplicate_asset_tag",
            Self::DuplicateProjectCode => "duplicate_project_code",
            Self::InvalidCredentials => "invalid_credentials",
            Self::ForbiddenOrgChange => "forbidden_org_change",
            Self::InsufficientPermissions => "insufficient_permissions",
            Self::CannotDeleteLastAdmin => "cannot_delete_last_admin",
            Self::CannotDeleteMainTenant => "cannot_delete_main_tenant",
            Self::CannotDeleteOrgWithData => "cannot_delete_org_with_data",
            Self::Database(e) if is_unavailable(e) => "db_unavailable",
            Self::Database(_) | Self::Internal(_) => "internal_error",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Outage-shaped database failures surface as `db_unavailable`; everything
/// else stays an opaque internal error.
fn is_unavailable(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
    )
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return match db_err.constraint() {
                    Some(ASSET_TAG_CONSTRAINT) => Self::DuplicateAssetTag,
                    Some(PROJECT_CODE_CONSTRAINT) => Self::DuplicateProjectCode,
                    _ => Self::Duplicate,
                };
            }
            // Tenant columns are NOT NULL with foreign keys; a violation
            // means the caller referenced a row outside its scope.
            if db_err.is_foreign_key_violation() || db_err.is_check_violation() {
                return Self::Validation(db_err.message().to_string());
            }
        }
        Self::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(CoreError::NotFound.code(), "not_found");
        assert_eq!(CoreError::Duplicate.code(), "duplicate");
        assert_eq!(CoreError::DuplicateAssetTag.code(), "duplicate_asset_tag");
        assert_eq!(
            CoreError::DuplicateProjectCode.code(),
            "duplicate_project_code"
        );
        assert_eq!(
            CoreError::CannotDeleteLastAdmin.code(),
            "cannot_delete_last_admin"
        );
        assert_eq!(
            CoreError::ForbiddenOrgChange.code(),
            "forbidden_org_change"
        );
        assert_eq!(
            CoreError::validation("missing site_id").code(),
            "validation_error"
        );
    }

    #[test]
    fn test_pool_timeout_is_unavailable() {
        let err = CoreError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code(), "db_unavailable");
    }

    #[test]
    fn test_row_not_found_is_internal() {
        // Store code maps missing rows to NotFound explicitly; a raw
        // RowNotFound reaching here is a bug, not a 404.
        let err = CoreError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), "internal_error");
    }
}
