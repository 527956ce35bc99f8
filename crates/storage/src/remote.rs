#![forbid(unsafe_code)]

use super::SqliteStore;
use async_trait::async_trait;
use sp_core::{Node, NodeId, ProjectId, Tag, TagDraft, TagId};
use sp_sync::{NewNode, NodeUpdate, RemoteSync, SuggestionRequest, SyncResult};
use tracing::debug;

/// Calls run inline on the caller's task; each one is a short SQLite
/// transaction behind the connection mutex.
#[async_trait]
impl RemoteSync for SqliteStore {
    async fn fetch_all(&self, project: &ProjectId, tag_filter: &[TagId]) -> SyncResult<Vec<Node>> {
        Ok(self.load_nodes(project, tag_filter)?)
    }

    async fn create(&self, project: &ProjectId, payload: NewNode) -> SyncResult<Node> {
        Ok(self.insert_node(project, payload)?)
    }

    async fn create_ai_suggestions(
        &self,
        project: &ProjectId,
        request: SuggestionRequest,
    ) -> SyncResult<Vec<Node>> {
        Ok(self.insert_suggestions(project, request)?)
    }

    async fn update(
        &self,
        project: &ProjectId,
        node: &NodeId,
        update: NodeUpdate,
    ) -> SyncResult<Node> {
        Ok(self.edit_node(project, node, update)?)
    }

    async fn activate(&self, project: &ProjectId, node: &NodeId) -> SyncResult<Node> {
        Ok(self.activate_node(project, node)?)
    }

    async fn attach_tag(&self, project: &ProjectId, tag: &TagId, node: &NodeId) -> SyncResult<()> {
        if !self.link_tag(project, tag, node)? {
            debug!(%tag, %node, "tag already attached");
        }
        Ok(())
    }

    async fn detach_tag(&self, project: &ProjectId, tag: &TagId, node: &NodeId) -> SyncResult<()> {
        if !self.unlink_tag(project, tag, node)? {
            debug!(%tag, %node, "tag was not attached");
        }
        Ok(())
    }

    async fn delete_node(&self, project: &ProjectId, node: &NodeId) -> SyncResult<()> {
        Ok(self.remove_node(project, node)?)
    }

    async fn list_tags(&self, project: &ProjectId) -> SyncResult<Vec<Tag>> {
        Ok(self.load_tags(project)?)
    }

    async fn create_tag(&self, project: &ProjectId, draft: TagDraft) -> SyncResult<Tag> {
        Ok(self.insert_tag(project, draft)?)
    }

    async fn update_tag(&self, project: &ProjectId, tag: &TagId, draft: TagDraft) -> SyncResult<Tag> {
        Ok(self.edit_tag(project, tag, draft)?)
    }

    async fn delete_tag(&self, project: &ProjectId, tag: &TagId) -> SyncResult<()> {
        Ok(self.remove_tag(project, tag)?)
    }

    async fn refresh_tag_summary(&self, project: &ProjectId, tag: &TagId) -> SyncResult<Tag> {
        Ok(self.summarize_tag(project, tag)?)
    }
}
