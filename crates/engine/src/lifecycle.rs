#![forbid(unsafe_code)]

//! GHOST→ACTIVE transitions and child spawning.
//!
//! Per node the state is `{GHOST, ACTIVE} × {ungenerated, generated}`. A node
//! starts as a GHOST proposal (or as the ACTIVE seed root), is confirmed by
//! the user, and an ACTIVE node spawns its children exactly once.

use crate::context::{SessionContext, SpawnGate};
use crate::error::{EngineError, EngineResult};
use crate::prompt::PromptRequest;
use crate::render::NoticeLevel;
use sp_core::layout::{ChildSlot, child_slots};
use sp_core::{Node, NodeContent, NodeId, NodePatch, NodeState, Position};
use sp_sync::{NewNode, NodeUpdate, SuggestionRequest};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const ROOT_AI_SLOTS: usize = 2;
const BRANCH_AI_SLOTS: usize = 1;

const PLACEHOLDER_PROMPT: &str = "Describe this idea";
const EDIT_PROMPT: &str = "Edit this statement";

/// Result of a spawn request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Spawn {
    /// The node already has its children.
    AlreadyGenerated,
    /// Another trigger for the same node is still running.
    InProgress,
    Created {
        children: Vec<NodeId>,
        suggested: usize,
        blank: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TapOutcome {
    Cancelled,
    /// Unchanged text on an already expanded node.
    NoChange,
    Activated,
    /// A placeholder received text and was confirmed.
    Edited(Spawn),
    Renamed(Option<Spawn>),
    /// Unchanged text on an ACTIVE node that had not spawned yet.
    Expanded(Spawn),
}

#[derive(Clone)]
pub struct LifecycleController {
    ctx: Arc<SessionContext>,
}

impl LifecycleController {
    pub fn new(ctx: Arc<SessionContext>) -> Self {
        Self { ctx }
    }

    /// Confirms a GHOST node as it is.
    pub async fn activate(&self, id: &NodeId) -> EngineResult<()> {
        let node = self.ctx.require("activate", id)?;
        if node.state != NodeState::Ghost {
            return Err(EngineError::InvalidState {
                op: "activate",
                reason: format!("node {id} is already active"),
            });
        }

        let record = self.ctx.remote.activate(&self.ctx.project, id).await?;
        self.ctx.ensure_open()?;
        if record.state != NodeState::Active {
            debug!(node = %id, state = record.state.as_str(), "activate answered without ACTIVE state");
        }

        self.commit("activate", id, NodePatch {
            state: Some(NodeState::Active),
            frozen: Some(true),
            ..NodePatch::default()
        })?;
        info!(node = %id, "node activated");
        Ok(())
    }

    /// Fills a placeholder GHOST node, confirms it and spawns its children.
    pub async fn edit_and_activate(&self, id: &NodeId, text: &str) -> EngineResult<Spawn> {
        let node = self.ctx.require("edit_and_activate", id)?;
        if node.state != NodeState::Ghost {
            return Err(EngineError::InvalidState {
                op: "edit_and_activate",
                reason: format!("node {id} is already active"),
            });
        }
        let content = filled(text)?;

        self.ctx
            .remote
            .update(
                &self.ctx.project,
                id,
                NodeUpdate {
                    content: Some(content.clone()),
                    ..NodeUpdate::default()
                },
            )
            .await?;
        self.ctx.ensure_open()?;

        // Saving the text confirms a placeholder.
        self.commit("edit_and_activate", id, NodePatch {
            content: Some(content),
            state: Some(NodeState::Active),
            frozen: Some(true),
            ..NodePatch::default()
        })?;
        info!(node = %id, "placeholder confirmed");
        self.spawn_children(id).await
    }

    /// Changes the text of an ACTIVE node. The first confirmed edit of an
    /// ungenerated node also spawns its children.
    pub async fn rename_active(&self, id: &NodeId, text: &str) -> EngineResult<Option<Spawn>> {
        let node = self.ctx.require("rename_active", id)?;
        if node.state != NodeState::Active {
            return Err(EngineError::InvalidState {
                op: "rename_active",
                reason: format!("node {id} is still a ghost"),
            });
        }
        let content = filled(text)?;

        self.ctx
            .remote
            .update(
                &self.ctx.project,
                id,
                NodeUpdate {
                    content: Some(content.clone()),
                    ..NodeUpdate::default()
                },
            )
            .await?;
        self.ctx.ensure_open()?;
        self.commit("rename_active", id, NodePatch {
            content: Some(content),
            ..NodePatch::default()
        })?;
        info!(node = %id, "node renamed");

        if node.generated {
            return Ok(None);
        }
        self.spawn_children(id).await.map(Some)
    }

    /// Creates the child proposals of an ACTIVE node, once.
    ///
    /// Root nodes get three children (two AI suggestions), others get two
    /// (one suggestion). Slots are filled sequentially in slot order. A slot
    /// whose suggestion fails becomes a blank placeholder; a slot whose blank
    /// cannot be persisted is dropped. If no slot could be persisted the
    /// parent stays ungenerated and the error is returned.
    pub async fn spawn_children(&self, id: &NodeId) -> EngineResult<Spawn> {
        let parent = self.ctx.require("spawn_children", id)?;
        if parent.state != NodeState::Active {
            return Err(EngineError::InvalidState {
                op: "spawn_children",
                reason: format!("ghost node {id} cannot have children"),
            });
        }
        match self.ctx.begin_spawn(id) {
            SpawnGate::Open => {}
            SpawnGate::InProgress => return Ok(Spawn::InProgress),
            SpawnGate::AlreadyGenerated => return Ok(Spawn::AlreadyGenerated),
            SpawnGate::Missing => {
                return Err(EngineError::Consistency {
                    op: "spawn_children",
                    node: id.clone(),
                });
            }
        }

        let result = self.fill_slots(&parent).await;
        self.ctx.end_spawn(id);
        result
    }

    async fn fill_slots(&self, parent: &Node) -> EngineResult<Spawn> {
        let grandparent = parent
            .parent_id
            .as_ref()
            .and_then(|gp| self.ctx.node(gp))
            .map(|gp| gp.position);
        if parent.parent_id.is_some() && grandparent.is_none() {
            debug!(node = %parent.id, "grandparent not loaded, branching along the x axis");
        }
        let slots = child_slots(parent.position, grandparent, parent.is_root());
        let ai_slots = if parent.is_root() {
            ROOT_AI_SLOTS
        } else {
            BRANCH_AI_SLOTS
        };
        let prompt = parent.content.text().unwrap_or_default().to_string();

        let mut children = Vec::with_capacity(slots.len());
        let mut suggested = 0;
        let mut last_error = None;

        for (index, slot) in slots.iter().enumerate() {
            let mut child = None;
            if index < ai_slots {
                child = self.suggest(parent, slot, &prompt).await;
                self.ctx.ensure_open()?;
                if child.is_some() {
                    suggested += 1;
                }
            }
            let child = match child {
                Some(child) => child,
                None => {
                    let created = self.ctx.remote.create(&self.ctx.project, blank(parent, slot)).await;
                    self.ctx.ensure_open()?;
                    match created {
                        Ok(node) => node,
                        Err(err) => {
                            warn!(parent = %parent.id, slot = slot.order, error = %err, "blank placeholder not persisted");
                            last_error = Some(err);
                            continue;
                        }
                    }
                }
            };
            children.push(place(child, parent, slot));
        }

        if children.is_empty() {
            let err = last_error.map(EngineError::from).unwrap_or_else(|| {
                EngineError::Transport("no child could be created".to_string())
            });
            return Err(err);
        }

        let slot_count = slots.len();
        let created = children.len();
        let ids: Vec<NodeId> = children.iter().map(|c| c.id.clone()).collect();
        self.ctx.write(|store| {
            if !store.contains(&parent.id) {
                return Err(EngineError::Consistency {
                    op: "spawn_children",
                    node: parent.id.clone(),
                });
            }
            store.upsert_many(children);
            store.patch(&parent.id, NodePatch {
                generated: Some(true),
                frozen: Some(true),
                ..NodePatch::default()
            });
            Ok(())
        })?;

        if created < slot_count {
            self.ctx.notice(
                NoticeLevel::Warning,
                format!("{} of {slot_count} proposals could not be saved", slot_count - created),
            );
        }
        info!(parent = %parent.id, created, suggested, "children spawned");
        Ok(Spawn::Created {
            children: ids,
            suggested,
            blank: created - suggested,
        })
    }

    /// One suggestion for one slot. Failure or an empty answer yields `None`.
    async fn suggest(&self, parent: &Node, slot: &ChildSlot, prompt: &str) -> Option<Node> {
        let request = SuggestionRequest {
            prompt: prompt.to_string(),
            position: slot.position,
            depth: parent.depth + 1,
            order: slot.order,
            parent_id: Some(parent.id.clone()),
            count: 1,
        };
        match self
            .ctx
            .remote
            .create_ai_suggestions(&self.ctx.project, request)
            .await
        {
            Ok(nodes) => {
                let first = nodes.into_iter().next();
                if first.is_none() {
                    warn!(parent = %parent.id, slot = slot.order, "no suggestion returned, using a blank");
                }
                first
            }
            Err(err) => {
                warn!(parent = %parent.id, slot = slot.order, error = %err, "suggestion failed, using a blank");
                None
            }
        }
    }

    /// Dispatches a tap on a node.
    pub async fn handle_tap(&self, id: &NodeId) -> EngineResult<TapOutcome> {
        let node = self.ctx.require("tap", id)?;
        match (node.state, &node.content) {
            (NodeState::Ghost, NodeContent::Unfilled) => {
                let Some(text) = self.ask(id, PLACEHOLDER_PROMPT, "").await? else {
                    return Ok(TapOutcome::Cancelled);
                };
                self.edit_and_activate(id, &text).await.map(TapOutcome::Edited)
            }
            (NodeState::Ghost, NodeContent::Filled(_)) => {
                self.activate(id).await.map(|()| TapOutcome::Activated)
            }
            (NodeState::Active, content) => {
                let current = content.text().unwrap_or_default();
                let Some(text) = self.ask(id, EDIT_PROMPT, current).await? else {
                    return Ok(TapOutcome::Cancelled);
                };
                if text != current.trim() {
                    return self.rename_active(id, &text).await.map(TapOutcome::Renamed);
                }
                // Re-read: the node may have spawned while the prompt was open.
                let generated = self.ctx.node(id).is_some_and(|n| n.generated);
                if generated {
                    return Ok(TapOutcome::NoChange);
                }
                self.spawn_children(id).await.map(TapOutcome::Expanded)
            }
        }
    }

    /// Trimmed, non-empty answer or `None` on cancel.
    async fn ask(&self, id: &NodeId, title: &str, initial: &str) -> EngineResult<Option<String>> {
        let answer = self
            .ctx
            .prompt
            .ask(PromptRequest {
                node: id.clone(),
                title: title.to_string(),
                initial: initial.to_string(),
            })
            .await;
        self.ctx.ensure_open()?;
        Ok(answer
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }

    /// Drag end. The local position changes immediately; persistence runs in
    /// the background and a failure is only logged.
    pub fn move_node(&self, id: &NodeId, position: Position) -> EngineResult<JoinHandle<()>> {
        self.ctx.require("move_node", id)?;
        self.commit("move_node", id, NodePatch {
            position: Some(position),
            ..NodePatch::default()
        })?;

        let remote = self.ctx.remote.clone();
        let project = self.ctx.project.clone();
        let id = id.clone();
        Ok(tokio::spawn(async move {
            let update = NodeUpdate {
                position: Some(position),
                ..NodeUpdate::default()
            };
            match remote.update(&project, &id, update).await {
                Ok(_) => debug!(node = %id, "position saved"),
                Err(err) => warn!(node = %id, error = %err, "position not saved"),
            }
        }))
    }

    fn commit(&self, op: &'static str, id: &NodeId, patch: NodePatch) -> EngineResult<()> {
        self.ctx.write(|store| {
            if !store.contains(id) {
                return Err(EngineError::Consistency {
                    op,
                    node: id.clone(),
                });
            }
            store.patch(id, patch);
            Ok(())
        })
    }
}

fn filled(text: &str) -> EngineResult<NodeContent> {
    match NodeContent::from_wire(text) {
        NodeContent::Unfilled => Err(EngineError::Validation(
            "content cannot be empty".to_string(),
        )),
        NodeContent::Filled(text) => Ok(NodeContent::Filled(text.trim().to_string())),
    }
}

fn blank(parent: &Node, slot: &ChildSlot) -> NewNode {
    NewNode {
        content: NodeContent::Unfilled,
        position: slot.position,
        depth: parent.depth + 1,
        order: slot.order,
        parent_id: Some(parent.id.clone()),
    }
}

/// Pins a persisted child to the slot it was requested for. Server records
/// keep their identity and tag set.
fn place(mut child: Node, parent: &Node, slot: &ChildSlot) -> Node {
    if child.parent_id.as_ref() != Some(&parent.id) || child.order_index != slot.order {
        debug!(child = %child.id, slot = slot.order, "server record reshaped to its slot");
    }
    child.parent_id = Some(parent.id.clone());
    child.position = slot.position;
    child.depth = parent.depth + 1;
    child.order_index = slot.order;
    child.state = NodeState::Ghost;
    child.generated = false;
    child.frozen = false;
    child
}
