#![forbid(unsafe_code)]

use async_trait::async_trait;
use sp_core::NodeId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptRequest {
    pub node: NodeId,
    pub title: String,
    /// Pre-filled text; empty for placeholders.
    pub initial: String,
}

/// Asks the user for text and suspends until they answer.
///
/// `None` means the user cancelled.
#[async_trait]
pub trait TextPrompt: Send + Sync {
    async fn ask(&self, request: PromptRequest) -> Option<String>;
}
