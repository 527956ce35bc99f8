#![forbid(unsafe_code)]

use crate::error::SyncResult;
use async_trait::async_trait;
use sp_core::{Node, NodeContent, NodeId, Position, ProjectId, Tag, TagDraft, TagId};

/// Payload for a plain node. The server assigns the permanent id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewNode {
    pub content: NodeContent,
    pub position: Position,
    pub depth: u32,
    pub order: u32,
    pub parent_id: Option<NodeId>,
}

/// One AI suggestion request. `count` is a ceiling, not a promise: the
/// server may return anywhere from zero to `count` nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct SuggestionRequest {
    pub prompt: String,
    pub position: Position,
    pub depth: u32,
    pub order: u32,
    pub parent_id: Option<NodeId>,
    pub count: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeUpdate {
    pub content: Option<NodeContent>,
    pub position: Option<Position>,
}

/// The persistence/AI service boundary.
///
/// Every call may fail with a transport or validation error and none is
/// retried here. Tag attach/detach are idempotent from the caller's point of
/// view: attaching an attached tag, or detaching an absent one, succeeds.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    /// All persisted nodes of a project, optionally limited to nodes carrying
    /// any of `tag_filter`.
    async fn fetch_all(&self, project: &ProjectId, tag_filter: &[TagId]) -> SyncResult<Vec<Node>>;

    async fn create(&self, project: &ProjectId, payload: NewNode) -> SyncResult<Node>;

    /// Suggested nodes come back already persisted in GHOST state.
    async fn create_ai_suggestions(
        &self,
        project: &ProjectId,
        request: SuggestionRequest,
    ) -> SyncResult<Vec<Node>>;

    async fn update(&self, project: &ProjectId, node: &NodeId, update: NodeUpdate)
    -> SyncResult<Node>;

    /// Server-side GHOST→ACTIVE transition.
    async fn activate(&self, project: &ProjectId, node: &NodeId) -> SyncResult<Node>;

    async fn attach_tag(&self, project: &ProjectId, tag: &TagId, node: &NodeId) -> SyncResult<()>;

    async fn detach_tag(&self, project: &ProjectId, tag: &TagId, node: &NodeId) -> SyncResult<()>;

    /// Administrative removal; the lifecycle never calls this.
    async fn delete_node(&self, project: &ProjectId, node: &NodeId) -> SyncResult<()>;

    async fn list_tags(&self, project: &ProjectId) -> SyncResult<Vec<Tag>>;

    async fn create_tag(&self, project: &ProjectId, draft: TagDraft) -> SyncResult<Tag>;

    async fn update_tag(&self, project: &ProjectId, tag: &TagId, draft: TagDraft)
    -> SyncResult<Tag>;

    async fn delete_tag(&self, project: &ProjectId, tag: &TagId) -> SyncResult<()>;

    /// Asks the server to recompute a tag's summary text.
    async fn refresh_tag_summary(&self, project: &ProjectId, tag: &TagId) -> SyncResult<Tag>;
}
