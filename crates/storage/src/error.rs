#![forbid(unsafe_code)]

use sp_sync::SyncError;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    InvalidInput(&'static str),
    UnknownNode(String),
    UnknownTag(String),
    NotGhost(String),
    HasChildren(String),
    TagNameTaken(String),
    CorruptRow(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownNode(id) => write!(f, "unknown node (id={id})"),
            Self::UnknownTag(id) => write!(f, "unknown tag (id={id})"),
            Self::NotGhost(id) => write!(f, "node is not in GHOST state (id={id})"),
            Self::HasChildren(id) => write!(f, "node has children (id={id})"),
            Self::TagNameTaken(name) => write!(f, "tag name already exists (name={name})"),
            Self::CorruptRow(message) => write!(f, "corrupt row: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<sp_core::TagNameError> for StoreError {
    fn from(value: sp_core::TagNameError) -> Self {
        Self::InvalidInput(value.message())
    }
}

impl From<sp_core::IdError> for StoreError {
    fn from(value: sp_core::IdError) -> Self {
        Self::CorruptRow(value.message().to_string())
    }
}

/// Maps local failures onto the status codes the REST service answers with.
impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::UnknownNode(_) => SyncError::NotFound("Node not found".to_string()),
            StoreError::UnknownTag(_) => SyncError::NotFound("Tag not found".to_string()),
            StoreError::NotGhost(_) => SyncError::Validation {
                status: 400,
                detail: "Node is not in GHOST state".to_string(),
            },
            StoreError::HasChildren(_) => SyncError::Validation {
                status: 400,
                detail: "Node has children".to_string(),
            },
            StoreError::TagNameTaken(_) => SyncError::Validation {
                status: 409,
                detail: "Tag name already exists".to_string(),
            },
            StoreError::InvalidInput(message) => SyncError::Validation {
                status: 400,
                detail: message.to_string(),
            },
            StoreError::CorruptRow(message) => SyncError::Decode(message),
            err @ (StoreError::Io(_) | StoreError::Sql(_)) => SyncError::Transport(err.to_string()),
        }
    }
}
