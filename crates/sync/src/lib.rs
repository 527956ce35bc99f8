#![forbid(unsafe_code)]

mod error;
mod http;
mod remote;
pub mod wire;

pub use error::{SyncError, SyncResult};
pub use http::{HttpRemote, HttpRemoteConfig};
pub use remote::{NewNode, NodeUpdate, RemoteSync, SuggestionRequest};
