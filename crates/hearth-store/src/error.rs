use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A document body could not be encoded or decoded as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A read or update addressed a document that does not exist.
    #[error("Record not found")]
    NotFound,

    /// A conditional create addressed a document that already exists.
    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    /// The path does not name a document (or collection) as required.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The query shape is not supported by the store.
    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored document does not match the expected record shape.
    #[error("Malformed document at {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
