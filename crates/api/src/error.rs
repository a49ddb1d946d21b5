//! Error types for the API
//!
//! Every failure leaving a handler is rendered as `{"error": ..., "code": ...}`
//! with a stable machine code. Status codes and codes are decided here and
//! nowhere else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

use siteledger_core::auth::TokenError;
use siteledger_core::CoreError;
use siteledger_importer::{ImportError, ImportSummary};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Authorization header is missing")]
    MissingAuthHeader,

    #[error("Authorization header must use the Bearer scheme")]
    InvalidAuthFormat,

    #[error("Bearer token is empty")]
    MissingToken,

    #[error("Bearer token is not structurally a token")]
    InvalidTokenFormat,

    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Access denied")]
    AccessDenied,

    #[error("{0}")]
    Token(#[from] TokenError),

    #[error("Request body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Import failed")]
    ImportFailed { summary: ImportSummary },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// The error body. `details` only appears on import failures, carrying the
/// partial summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingAuthHeader => "missing_auth_header",
            Self::InvalidAuthFormat => "invalid_auth_format",
            Self::MissingToken => "missing_token",
            Self::InvalidTokenFormat => "invalid_token_format",
            Self::AuthenticationRequired => "authentication_required",
            Self::AccessDenied => "access_denied",
            Self::Token(e) => e.code(),
            Self::InvalidJson(_) => "invalid_json",
            Self::ImportFailed { .. } => "import_failed",
            Self::Core(e) => e.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingAuthHeader
            | Self::InvalidAuthFormat
            | Self::MissingToken
            | Self::InvalidTokenFormat
            | Self::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            Self::Token(TokenError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::Token(_) => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Self::ImportFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Core(e) => match e.code() {
                "validation_error" | "cannot_delete_last_admin" | "cannot_delete_main_tenant"
                | "cannot_delete_org_with_data" => StatusCode::BAD_REQUEST,
                "invalid_credentials" => StatusCode::UNAUTHORIZED,
                "insufficient_permissions" | "forbidden_org_change" => StatusCode::FORBIDDEN,
                "not_found" => StatusCode::NOT_FOUND,
                "duplicate" | "duplicate_asset_tag" | "duplicate_project_code" => {
                    StatusCode::CONFLICT
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Human message for the body. Internal failures are logged server-side
    /// and replaced with a generic line so nothing leaks.
    fn public_message(&self) -> String {
        if self.status() == StatusCode::INTERNAL_SERVER_ERROR {
            error!("internal error: {}", self);
            return "internal server error".to_string();
        }
        self.to_string()
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::ImportFailed { summary } => serde_json::to_value(summary).ok(),
            _ => None,
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Workbook(msg) | ImportError::Mapping(msg) => {
                Self::Core(CoreError::Validation(msg))
            }
            ImportError::TooManyErrors { summary } => Self::ImportFailed { summary },
            ImportError::SystemFailure { source, summary } => {
                // The cause is logged here; the response still carries the
                // partial summary in `details`.
                error!("import stopped by a system failure: {}", source);
                Self::ImportFailed { summary }
            }
            ImportError::Core(e) => Self::Core(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.public_message(),
            code: self.code().to_string(),
            details: self.details(),
        };
        (self.status(), Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_errors_are_401() {
        for err in [
            ApiError::MissingAuthHeader,
            ApiError::InvalidAuthFormat,
            ApiError::MissingToken,
            ApiError::InvalidTokenFormat,
            ApiError::Token(TokenError::Expired),
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED, "{:?}", err);
        }
        assert_eq!(
            ApiError::Token(TokenError::Expired).code(),
            "token_expired"
        );
    }

    #[test]
    fn test_core_error_status_mapping() {
        assert_eq!(
            ApiError::Core(CoreError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Core(CoreError::Duplicate).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Core(CoreError::InsufficientPermissions).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::Core(CoreError::CannotDeleteLastAdmin).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Core(CoreError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_message_is_generic() {
        let err = ApiError::Core(CoreError::Internal("pool exploded at 3am".to_string()));
        assert_eq!(err.public_message(), "internal server error");
    }

    #[test]
    fn test_import_failure_carries_summary() {
        let err = ApiError::ImportFailed {
            summary: ImportSummary::default(),
        };
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "import_failed");
        assert!(err.details().is_some());
    }

    #[test]
    fn test_system_failure_keeps_partial_summary() {
        let err = ApiError::from(ImportError::SystemFailure {
            source: CoreError::Database(sqlx::Error::PoolTimedOut),
            summary: ImportSummary::default(),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "import_failed");
        assert!(err.details().is_some());
    }
}
