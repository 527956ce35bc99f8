#![forbid(unsafe_code)]

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Failures crossing the persistence boundary. Nothing here is retried.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network or server-side failure.
    #[error("transport: {0}")]
    Transport(String),

    /// The server rejected the payload.
    #[error("rejected ({status}): {detail}")]
    Validation { status: u16, detail: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// A response could not be mapped onto the node/tag model.
    #[error("decode: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SyncError {
    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport(_))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            SyncError::Decode(value.to_string())
        } else {
            SyncError::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(value: serde_json::Error) -> Self {
        SyncError::Decode(value.to_string())
    }
}

impl From<sp_core::IdError> for SyncError {
    fn from(value: sp_core::IdError) -> Self {
        SyncError::Decode(value.message().to_string())
    }
}
