use rouille::Response;
use serde_json::json;

use crate::{relay::error::RelayError, source::error::SourceError, storage::error::StorageError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    Internal(String),
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::NotConnected | RelayError::NoTrack => ApiError::Conflict(err.to_string()),

            RelayError::NoFilePath => ApiError::BadRequest(err.to_string()),

            RelayError::WebSocket(_) => ApiError::BadGateway(err.to_string()),

            RelayError::Fs(_)
            | RelayError::Encode(_)
            | RelayError::Storage(_)
            | RelayError::Poisoned => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Conflict(_) => 409,
            ApiError::BadGateway(_) => 502,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::BadGateway(msg)
            | ApiError::Internal(msg) => msg,
        }
    }

    /// `{"success": false, "error": "..."}` with the matching status
    pub fn into_response(self) -> Response {
        Response::json(&json!({ "success": false, "error": self.message() }))
            .with_status_code(self.status_code())
    }
}
