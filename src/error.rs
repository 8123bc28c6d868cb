use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Collaborator step failed: {0}")]
    Collaborator(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
