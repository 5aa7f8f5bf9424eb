use thiserror::Error;

use crate::storage::error::StorageError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("websocket not connected")]
    NotConnected,

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("no file path specified")]
    NoFilePath,

    #[error("no track to send")]
    NoTrack,

    #[error("file error: {0}")]
    Fs(#[from] std::io::Error),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("relay lock poisoned")]
    Poisoned,
}
