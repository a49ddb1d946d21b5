//! Import result types, shaped for the upload response body

use serde::Serialize;
use utoipa::ToSchema;

/// One recorded row failure. `row` is 1-based and counts the header row, so
/// the first data row is row 2.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorSample {
    pub sheet: String,
    pub row: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SheetSummary {
    pub name: String,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub error_samples: Vec<ErrorSample>,
}

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ImportSummary {
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub dry_run: bool,
    pub sheets: Vec<SheetSummary>,
}

impl ImportSummary {
    pub fn push_sheet(&mut self, sheet: SheetSummary) {
        self.inserted += sheet.inserted;
        self.updated += sheet.updated;
        self.skipped += sheet.skipped;
        self.errors += sheet.errors;
        self.sheets.push(sheet);
    }
}
