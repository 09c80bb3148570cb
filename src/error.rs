use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowbookError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not read spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Unsupported file type: {0} (expected xlsx, xls, xlsm, csv or txt)")]
    UnsupportedFileType(String),

    #[error("File exceeds the {0}MB upload limit")]
    FileTooLarge(u64),

    #[error("Pasted text exceeds the {0} character limit")]
    PasteTooLarge(usize),

    #[error("No rows detected in the pasted text. Copy a table from your spreadsheet and try again.")]
    EmptyPaste,

    #[error("Import session is missing or has expired. Reload the file and try again.")]
    SessionNotFound,

    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown cash-flow source: {0}")]
    UnknownSource(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FlowbookError>;
