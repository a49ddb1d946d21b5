//! Error types for the import pipeline

use thiserror::Error;

use siteledger_core::CoreError;

use crate::summary::ImportSummary;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("workbook could not be read: {0}")]
    Workbook(String),

    #[error("mapping document is invalid: {0}")]
    Mapping(String),

    #[error("import aborted: error count exceeded max_errors")]
    TooManyErrors {
        /// Work committed (or simulated) before the stop condition hit.
        summary: ImportSummary,
    },

    #[error("import aborted by a system failure: {source}")]
    SystemFailure {
        source: CoreError,
        /// Work committed (or simulated) before the failure.
        summary: ImportSummary,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        Self::Workbook(err.to_string())
    }
}

impl From<serde_yaml::Error> for ImportError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Mapping(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
