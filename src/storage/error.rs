use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("stored value for {key} is corrupted: {source}")]
    Corrupted {
        key: String,
        source: serde_json::Error,
    },

    #[error("filesystem error: {0}")]
    Fs(#[from] std::io::Error),
}
