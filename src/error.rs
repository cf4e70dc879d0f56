//! Error type shared by the store, backups and sessions

/// Everything the library can fail with
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input rejected before touching the store (e.g. an empty plan title)
    #[error("validation error: {0}")]
    Validation(String),

    /// Backup file could not be used; the store was left as it was
    #[error("import error: {0}")]
    Import(String),

    /// The user closed the file picker without choosing a file
    #[error("backup cancelled: no file chosen")]
    BackupCancelled,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A stored JSON column could not be encoded or decoded
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
