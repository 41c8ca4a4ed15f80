use thiserror::Error;

#[derive(Error, Debug)]
pub enum TillrollError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Header validation failed: {}", missing.join(", "))]
    HeaderValidation { missing: Vec<String> },

    #[error("Unsupported file type: {0} (expected .csv or .xlsb)")]
    UnsupportedFileType(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Unknown job: {0}")]
    JobNotFound(String),

    #[error("Job {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, TillrollError>;
