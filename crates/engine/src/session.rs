#![forbid(unsafe_code)]

//! One open project view.

use crate::config::EngineConfig;
use crate::context::SessionContext;
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{LifecycleController, TapOutcome};
use crate::prompt::TextPrompt;
use crate::render::{GestureEvent, NoticeLevel, RenderAdapter};
use crate::tags::{ContextMenu, TagChange, TagOverlay};
use sp_core::{Node, NodeContent, NodeId, NodeState, ProjectId, TagId};
use sp_sync::{NewNode, RemoteSync};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum Outcome {
    Tap(TapOutcome),
    /// Background persistence of a drag; awaiting it is optional.
    Moved(JoinHandle<()>),
    Menu(ContextMenu),
}

pub struct Session {
    ctx: Arc<SessionContext>,
    lifecycle: LifecycleController,
    tags: TagOverlay,
}

impl Session {
    /// Loads the project, seeding a root when it is empty, and renders it.
    pub async fn open(
        project: ProjectId,
        remote: Arc<dyn RemoteSync>,
        renderer: Arc<dyn RenderAdapter>,
        prompt: Arc<dyn TextPrompt>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        config.validate()?;
        let ctx = SessionContext::new(project, remote, renderer, prompt, config);

        let mut nodes = ctx.remote.fetch_all(&ctx.project, &[]).await?;
        if nodes.is_empty() {
            nodes.push(seed_root(&ctx).await?);
        }
        let count = nodes.len();
        let nodes = prepare(nodes);

        let issues = ctx.write(|store| {
            store.upsert_many(nodes);
            store.validate_tree()
        });
        for issue in &issues {
            warn!(project = %ctx.project, issue = %issue.message(), "tree issue on load");
        }

        let session = Self {
            lifecycle: LifecycleController::new(ctx.clone()),
            tags: TagOverlay::new(ctx.clone()),
            ctx,
        };
        if let Err(err) = session.tags.load_tags().await {
            warn!(project = %session.ctx.project, error = %err, "tag catalog unavailable");
            session
                .ctx
                .notice(NoticeLevel::Warning, format!("tags not loaded: {err}"));
        }
        info!(
            project = %session.ctx.project,
            nodes = count,
            issues = issues.len(),
            "session opened"
        );
        Ok(session)
    }

    /// Routes a gesture. Remote failures are also shown as a notice.
    pub async fn handle(&self, event: GestureEvent) -> EngineResult<Outcome> {
        let result = match event {
            GestureEvent::Tap(node) => self.lifecycle.handle_tap(&node).await.map(Outcome::Tap),
            GestureEvent::RightClick { node, screen } => {
                self.tags.context_menu(&node, screen).map(Outcome::Menu)
            }
            GestureEvent::DragEnd { node, position } => {
                self.lifecycle.move_node(&node, position).map(Outcome::Moved)
            }
        };
        self.report(result)
    }

    /// Attaches a tag. `propagate: None` uses the configured default.
    pub async fn attach_tag(
        &self,
        tag: &TagId,
        node: &NodeId,
        propagate: Option<bool>,
    ) -> EngineResult<TagChange> {
        let propagate = propagate.unwrap_or(self.ctx.config.propagate_tags);
        let result = self.tags.attach(tag, node, propagate).await;
        self.refresh_highlight(tag);
        self.report(result)
    }

    pub async fn detach_tag(
        &self,
        tag: &TagId,
        node: &NodeId,
        propagate: Option<bool>,
    ) -> EngineResult<TagChange> {
        let propagate = propagate.unwrap_or(self.ctx.config.propagate_tags);
        let result = self.tags.detach(tag, node, propagate).await;
        self.refresh_highlight(tag);
        self.report(result)
    }

    /// Discards the results of every remote call still in flight.
    pub fn close(&self) {
        if !self.ctx.is_closed() {
            self.ctx.close();
            info!(project = %self.ctx.project, "session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.ctx.is_closed()
    }

    pub fn project(&self) -> &ProjectId {
        self.ctx.project()
    }

    pub fn node(&self, id: &NodeId) -> Option<Node> {
        self.ctx.node(id)
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.ctx.nodes()
    }

    pub fn lifecycle(&self) -> &LifecycleController {
        &self.lifecycle
    }

    pub fn tags(&self) -> &TagOverlay {
        &self.tags
    }

    fn refresh_highlight(&self, tag: &TagId) {
        if self.tags.selected().as_ref() == Some(tag) {
            self.tags.select(Some(tag.clone()));
        }
    }

    fn report<T>(&self, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(err) = &result {
            match err {
                EngineError::SessionClosed => debug!("late result discarded"),
                err if err.is_remote() => self.ctx.notice(NoticeLevel::Error, err.to_string()),
                err => warn!(error = %err, "gesture rejected"),
            }
        }
        result
    }
}

async fn seed_root(ctx: &SessionContext) -> EngineResult<Node> {
    let payload = NewNode {
        content: NodeContent::Filled(ctx.config.root_label.trim().to_string()),
        position: ctx.config.root_position,
        depth: 0,
        order: 0,
        parent_id: None,
    };
    let mut root = ctx.remote.create(&ctx.project, payload).await?;
    ctx.ensure_open()?;
    if root.state != NodeState::Active {
        debug!(node = %root.id, "seed root answered as ghost");
    }
    root.state = NodeState::Active;
    root.parent_id = None;
    info!(project = %ctx.project, node = %root.id, "empty project seeded");
    Ok(root)
}

/// Orders fetched nodes parents-first and marks every node that already has
/// children as spawned.
fn prepare(mut nodes: Vec<Node>) -> Vec<Node> {
    let parents: HashSet<NodeId> = nodes.iter().filter_map(|n| n.parent_id.clone()).collect();
    for node in &mut nodes {
        if parents.contains(&node.id) {
            node.generated = true;
            node.frozen = true;
        }
    }
    nodes.sort_by_key(|node| node.depth);
    nodes
}
