use std::path::PathBuf;
use thiserror::Error;

/// User-facing failure taxonomy. Parsing problems inside a metrics blob
/// never show up here; they are absorbed field-by-field in the decoder.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no database uploaded yet; POST a SQLite file to /upload-db")]
    NoDatabase,

    #[error("start_ms ({start_ms}) must be <= end_ms ({end_ms})")]
    InvalidRange { start_ms: i64, end_ms: i64 },

    #[error("no records found in the active database")]
    NoRecords,

    #[error("bad upload: {0}")]
    BadUpload(String),

    #[error("failed to replace active database at {path:?}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
