use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read metadata: {0}")]
    Io(#[from] std::io::Error),

    #[error("metadata is not valid json: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("metadata source unavailable: {0}")]
    Unavailable(String),
}
