#![forbid(unsafe_code)]

//! Tag attachment, propagation and highlighting over the tree.

use crate::context::SessionContext;
use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use sp_core::{NodeId, NodePatch, Position, Tag, TagDraft, TagId, normalize_tag_name};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Which nodes a tag edit touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagChange {
    /// Nodes whose tag set changed, in visit order.
    pub applied: Vec<NodeId>,
    /// Nodes that were already in the requested state; no remote call was made.
    pub unchanged: Vec<NodeId>,
}

/// Payload for a right-click on a node.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextMenu {
    pub node: NodeId,
    pub screen: Position,
    pub attached: Vec<Tag>,
    pub available: Vec<Tag>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Edit {
    Attach,
    Detach,
}

pub struct TagOverlay {
    ctx: Arc<SessionContext>,
    catalog: Mutex<Vec<Tag>>,
}

impl TagOverlay {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self {
            ctx,
            catalog: Mutex::new(Vec::new()),
        }
    }

    /// Attaches `tag` to `node`, and to every descendant when `propagate` is
    /// set. One remote call per node that does not carry the tag yet. Each
    /// node is committed locally as soon as its call succeeds; the first
    /// failure stops the walk.
    pub async fn attach(
        &self,
        tag: &TagId,
        node: &NodeId,
        propagate: bool,
    ) -> EngineResult<TagChange> {
        self.edit(Edit::Attach, tag, node, propagate).await
    }

    /// Mirror of [`TagOverlay::attach`].
    pub async fn detach(
        &self,
        tag: &TagId,
        node: &NodeId,
        propagate: bool,
    ) -> EngineResult<TagChange> {
        self.edit(Edit::Detach, tag, node, propagate).await
    }

    async fn edit(
        &self,
        edit: Edit,
        tag: &TagId,
        node: &NodeId,
        propagate: bool,
    ) -> EngineResult<TagChange> {
        let op = match edit {
            Edit::Attach => "attach_tag",
            Edit::Detach => "detach_tag",
        };
        self.ctx.require(op, node)?;
        let mut targets = vec![node.clone()];
        if propagate {
            targets.extend(self.ctx.read(|store| store.children_of(node)));
        }

        let mut change = TagChange::default();
        for target in targets {
            let Some(current) = self.ctx.node(&target) else {
                return Err(EngineError::Consistency {
                    op,
                    node: target,
                });
            };
            let wanted = edit == Edit::Attach;
            if current.has_tag(tag) == wanted {
                change.unchanged.push(target);
                continue;
            }

            match edit {
                Edit::Attach => {
                    self.ctx
                        .remote
                        .attach_tag(&self.ctx.project, tag, &target)
                        .await?
                }
                Edit::Detach => {
                    self.ctx
                        .remote
                        .detach_tag(&self.ctx.project, tag, &target)
                        .await?
                }
            }
            self.ctx.ensure_open()?;

            let committed = self.ctx.write(|store| {
                let Some(node) = store.get(&target) else {
                    return false;
                };
                let mut tags = node.tags.clone();
                let flipped = if wanted {
                    tags.insert(tag.clone())
                } else {
                    tags.remove(tag)
                };
                if flipped {
                    store.patch(&target, NodePatch {
                        tags: Some(tags),
                        ..NodePatch::default()
                    });
                }
                flipped
            });
            if committed {
                self.bump_count(tag, wanted);
                change.applied.push(target);
            } else {
                change.unchanged.push(target);
            }
        }
        info!(
            %tag,
            %node,
            op,
            applied = change.applied.len(),
            unchanged = change.unchanged.len(),
            "tag edit"
        );
        Ok(change)
    }

    /// Nodes currently carrying `tag`, recomputed from the store.
    pub fn highlight_set(&self, tag: &TagId) -> BTreeSet<NodeId> {
        self.ctx.read(|store| {
            store
                .all()
                .into_iter()
                .filter(|node| node.has_tag(tag))
                .map(|node| node.id.clone())
                .collect()
        })
    }

    /// Highlights the nodes carrying `tag`; `None` clears every highlight.
    pub fn select(&self, tag: Option<TagId>) {
        let lit = tag
            .as_ref()
            .map(|tag| self.highlight_set(tag))
            .unwrap_or_default();
        let instructions = self.ctx.with_projector(|projector| projector.select(tag, lit));
        for instruction in instructions {
            self.ctx.render(instruction);
        }
    }

    pub fn selected(&self) -> Option<TagId> {
        self.ctx.with_projector(|projector| projector.selected().cloned())
    }

    pub fn highlighted(&self) -> BTreeSet<NodeId> {
        self.ctx
            .with_projector(|projector| projector.highlighted().clone())
    }

    pub async fn load_tags(&self) -> EngineResult<Vec<Tag>> {
        let tags = self.ctx.remote.list_tags(&self.ctx.project).await?;
        self.ctx.ensure_open()?;
        debug!(count = tags.len(), "tag catalog loaded");
        *self.catalog.lock() = tags.clone();
        Ok(tags)
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.catalog.lock().clone()
    }

    pub fn tag(&self, id: &TagId) -> Option<Tag> {
        self.catalog.lock().iter().find(|t| &t.id == id).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Tag> {
        let name = normalize_tag_name(name).ok()?;
        self.catalog.lock().iter().find(|t| t.name == name).cloned()
    }

    pub async fn create_tag(&self, mut draft: TagDraft) -> EngineResult<Tag> {
        let name = normalize_tag_name(draft.name.as_deref().unwrap_or_default())
            .map_err(|err| EngineError::Validation(err.message().to_string()))?;
        draft.name = Some(name);
        let tag = self.ctx.remote.create_tag(&self.ctx.project, draft).await?;
        self.ctx.ensure_open()?;
        self.catalog.lock().push(tag.clone());
        info!(tag = %tag.id, name = %tag.name, "tag created");
        Ok(tag)
    }

    pub async fn update_tag(&self, id: &TagId, mut draft: TagDraft) -> EngineResult<Tag> {
        if let Some(name) = draft.name.as_deref() {
            let name = normalize_tag_name(name)
                .map_err(|err| EngineError::Validation(err.message().to_string()))?;
            draft.name = Some(name);
        }
        let tag = self
            .ctx
            .remote
            .update_tag(&self.ctx.project, id, draft)
            .await?;
        self.ctx.ensure_open()?;
        self.replace(tag.clone());
        Ok(tag)
    }

    /// Deletes a tag and strips it from every local node.
    pub async fn delete_tag(&self, id: &TagId) -> EngineResult<()> {
        self.ctx.remote.delete_tag(&self.ctx.project, id).await?;
        self.ctx.ensure_open()?;

        self.catalog.lock().retain(|t| &t.id != id);
        if self.selected().as_ref() == Some(id) {
            self.select(None);
        }
        self.ctx.write(|store| {
            let carriers: Vec<_> = store
                .all()
                .into_iter()
                .filter(|node| node.has_tag(id))
                .map(|node| {
                    let mut tags = node.tags.clone();
                    tags.remove(id);
                    (node.id.clone(), tags)
                })
                .collect();
            for (node, tags) in carriers {
                store.patch(&node, NodePatch {
                    tags: Some(tags),
                    ..NodePatch::default()
                });
            }
        });
        info!(tag = %id, "tag deleted");
        Ok(())
    }

    pub async fn refresh_summary(&self, id: &TagId) -> EngineResult<Tag> {
        let tag = self
            .ctx
            .remote
            .refresh_tag_summary(&self.ctx.project, id)
            .await?;
        self.ctx.ensure_open()?;
        self.replace(tag.clone());
        Ok(tag)
    }

    /// Tags attached to `node` and tags that could still be attached, both in
    /// catalog order.
    pub fn context_menu(&self, node: &NodeId, screen: Position) -> EngineResult<ContextMenu> {
        let current = self.ctx.require("context_menu", node)?;
        let (attached, available): (Vec<Tag>, Vec<Tag>) = self
            .catalog
            .lock()
            .iter()
            .cloned()
            .partition(|tag| current.has_tag(&tag.id));
        Ok(ContextMenu {
            node: node.clone(),
            screen,
            attached,
            available,
        })
    }

    fn replace(&self, tag: Tag) {
        let mut catalog = self.catalog.lock();
        match catalog.iter_mut().find(|t| t.id == tag.id) {
            Some(slot) => *slot = tag,
            None => catalog.push(tag),
        }
    }

    fn bump_count(&self, id: &TagId, up: bool) {
        if let Some(tag) = self.catalog.lock().iter_mut().find(|t| &t.id == id) {
            tag.node_count = if up {
                tag.node_count.saturating_add(1)
            } else {
                tag.node_count.saturating_sub(1)
            };
        }
    }
}
