use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DocgridError {
    #[error("source '{source_id}' unavailable: {reason}")]
    SourceUnavailable { source_id: String, reason: String },

    #[error("unreadable PDF: {reason}")]
    UnreadablePdf { reason: String },

    #[error("pdftotext not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    PdftotextNotFound,

    #[error("PDF extraction failed: {0}")]
    Extraction(String),

    #[error("failed to load ruleset from {path}: {reason}")]
    RulesetLoad { path: PathBuf, reason: String },

    #[error("invalid ruleset: {0}")]
    RulesetInvalid(String),

    #[error("table '{table}' exists with columns [{found}] but rows have columns [{expected}]; rerun with --replace")]
    SchemaMismatch {
        table: String,
        expected: String,
        found: String,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("unsupported connection string '{0}' (expected postgres://... or sqlite:...)")]
    UnsupportedConnection(String),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for DocgridError {
    fn from(e: rusqlite::Error) -> Self {
        DocgridError::Database(e.to_string())
    }
}

impl From<postgres::Error> for DocgridError {
    fn from(e: postgres::Error) -> Self {
        DocgridError::Database(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for DocgridError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        DocgridError::Spreadsheet(e.to_string())
    }
}
