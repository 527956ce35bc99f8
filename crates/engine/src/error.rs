#![forbid(unsafe_code)]

use sp_core::NodeId;
use sp_sync::SyncError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The remote service was unreachable or failed. Local state is unchanged.
    #[error("transport: {0}")]
    Transport(String),

    /// The remote service rejected the request.
    #[error("rejected: {0}")]
    Validation(String),

    /// A lookup or identifier check failed; only the current operation aborts.
    #[error("consistency violation in {op}: node {node}")]
    Consistency { op: &'static str, node: NodeId },

    /// The node is not in a state the operation accepts.
    #[error("{op} not allowed: {reason}")]
    InvalidState { op: &'static str, reason: String },

    #[error("session closed")]
    SessionClosed,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Errors that are shown to the user as a notice rather than swallowed.
    pub fn is_remote(&self) -> bool {
        matches!(self, EngineError::Transport(_) | EngineError::Validation(_))
    }
}

impl From<SyncError> for EngineError {
    fn from(value: SyncError) -> Self {
        match value {
            SyncError::Transport(message) => EngineError::Transport(message),
            SyncError::Decode(message) => EngineError::Transport(format!("bad response: {message}")),
            SyncError::Validation { status, detail } => {
                EngineError::Validation(format!("{detail} ({status})"))
            }
            SyncError::NotFound(detail) => EngineError::Validation(detail),
            SyncError::Config(message) => EngineError::Config(message),
        }
    }
}
