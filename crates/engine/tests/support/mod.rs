#![forbid(unsafe_code)]
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use sp_core::{
    Node, NodeContent, NodeId, NodeState, Position, ProjectId, Tag, TagDraft, TagId,
};
use sp_engine::{
    EngineConfig, NoticeLevel, PromptRequest, RenderAdapter, RenderInstruction, Session,
    TextPrompt,
};
use sp_sync::{NewNode, NodeUpdate, RemoteSync, SuggestionRequest, SyncError, SyncResult};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;

pub(crate) fn id(value: &str) -> NodeId {
    NodeId::try_new(value).expect("node id")
}

pub(crate) fn tag_id(value: &str) -> TagId {
    TagId::try_new(value).expect("tag id")
}

pub(crate) fn project() -> ProjectId {
    ProjectId::try_new("p1").expect("project id")
}

pub(crate) fn node(
    node_id: &str,
    parent: Option<&str>,
    state: NodeState,
    content: Option<&str>,
) -> Node {
    Node {
        id: id(node_id),
        content: content.map_or(NodeContent::Unfilled, |c| NodeContent::Filled(c.to_string())),
        position: Position::new(300.0, 300.0),
        depth: 0,
        order_index: 0,
        parent_id: parent.map(id),
        state,
        generated: false,
        frozen: false,
        tags: BTreeSet::new(),
    }
}

pub(crate) fn at(mut node: Node, x: f64, y: f64, depth: u32, order: u32) -> Node {
    node.position = Position::new(x, y);
    node.depth = depth;
    node.order_index = order;
    node
}

pub(crate) fn transport(message: &str) -> SyncError {
    SyncError::Transport(message.to_string())
}

/// What one `create_ai_suggestions` call answers.
pub(crate) enum Suggest {
    Ideas(Vec<&'static str>),
    Fail,
}

#[derive(Default)]
struct State {
    nodes: Vec<Node>,
    tags: Vec<Tag>,
    next_id: u64,
    suggestions: VecDeque<Suggest>,
    failures: HashMap<&'static str, VecDeque<SyncError>>,
    calls: Vec<String>,
}

/// Scripted in-memory persistence service.
///
/// Every call yields once before answering so concurrent callers interleave.
#[derive(Default)]
pub(crate) struct MemoryRemote {
    state: Mutex<State>,
    gates: Mutex<HashMap<&'static str, Arc<Notify>>>,
}

impl MemoryRemote {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                next_id: 100,
                ..State::default()
            }),
            gates: Mutex::default(),
        })
    }

    pub(crate) fn seed(&self, nodes: impl IntoIterator<Item = Node>) {
        self.state.lock().nodes.extend(nodes);
    }

    pub(crate) fn seed_tag(&self, tag_id: &str, name: &str) {
        self.state.lock().tags.push(Tag {
            id: self::tag_id(tag_id),
            name: name.to_string(),
            description: None,
            color: None,
            node_count: 0,
            summary: None,
        });
    }

    pub(crate) fn script_suggestions(&self, answers: impl IntoIterator<Item = Suggest>) {
        self.state.lock().suggestions.extend(answers);
    }

    /// The next call to `op` fails with `err`.
    pub(crate) fn fail_next(&self, op: &'static str, err: SyncError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Calls to `op` wait until the returned handle is notified.
    pub(crate) fn gate(&self, op: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.gates.lock().insert(op, notify.clone());
        notify
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn take_calls(&self) -> Vec<String> {
        std::mem::take(&mut self.state.lock().calls)
    }

    pub(crate) fn stored(&self, node_id: &str) -> Option<Node> {
        let wanted = id(node_id);
        self.state
            .lock()
            .nodes
            .iter()
            .find(|n| n.id == wanted)
            .cloned()
    }

    async fn enter(&self, op: &'static str, subject: Option<&str>) -> SyncResult<()> {
        {
            let mut state = self.state.lock();
            state.calls.push(match subject {
                Some(subject) => format!("{op} {subject}"),
                None => op.to_string(),
            });
        }
        tokio::task::yield_now().await;
        let gate = self.gates.lock().get(op).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let failure = self
            .state
            .lock()
            .failures
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn persist(
        state: &mut State,
        content: NodeContent,
        state_of: NodeState,
        position: Position,
        depth: u32,
        order: u32,
        parent_id: Option<NodeId>,
    ) -> Node {
        state.next_id += 1;
        let tags = parent_id
            .as_ref()
            .and_then(|p| state.nodes.iter().find(|n| &n.id == p))
            .map(|p| p.tags.clone())
            .unwrap_or_default();
        let node = Node {
            id: id(&format!("n{}", state.next_id)),
            content,
            position,
            depth,
            order_index: order,
            parent_id,
            state: state_of,
            generated: false,
            frozen: false,
            tags,
        };
        state.nodes.push(node.clone());
        node
    }

    fn with_node<R>(
        &self,
        node_id: &NodeId,
        f: impl FnOnce(&mut Node) -> R,
    ) -> SyncResult<R> {
        let mut state = self.state.lock();
        state
            .nodes
            .iter_mut()
            .find(|n| &n.id == node_id)
            .map(f)
            .ok_or_else(|| SyncError::NotFound("Node not found".to_string()))
    }

    fn with_tag<R>(&self, tag: &TagId, f: impl FnOnce(&mut Tag) -> R) -> SyncResult<R> {
        let mut state = self.state.lock();
        state
            .tags
            .iter_mut()
            .find(|t| &t.id == tag)
            .map(f)
            .ok_or_else(|| SyncError::NotFound("Tag not found".to_string()))
    }
}

#[async_trait]
impl RemoteSync for MemoryRemote {
    async fn fetch_all(&self, _project: &ProjectId, tag_filter: &[TagId]) -> SyncResult<Vec<Node>> {
        self.enter("fetch_all", None).await?;
        let state = self.state.lock();
        Ok(state
            .nodes
            .iter()
            .filter(|n| tag_filter.is_empty() || tag_filter.iter().any(|t| n.has_tag(t)))
            .cloned()
            .collect())
    }

    async fn create(&self, _project: &ProjectId, payload: NewNode) -> SyncResult<Node> {
        let parent = payload.parent_id.as_ref().map(|p| p.to_string());
        self.enter("create", parent.as_deref()).await?;
        let state_of = if payload.content.is_unfilled() {
            NodeState::Ghost
        } else {
            NodeState::Active
        };
        let mut state = self.state.lock();
        Ok(Self::persist(
            &mut state,
            payload.content,
            state_of,
            payload.position,
            payload.depth,
            payload.order,
            payload.parent_id,
        ))
    }

    async fn create_ai_suggestions(
        &self,
        _project: &ProjectId,
        request: SuggestionRequest,
    ) -> SyncResult<Vec<Node>> {
        let parent = request.parent_id.as_ref().map(|p| p.to_string());
        self.enter("suggest", parent.as_deref()).await?;
        let mut state = self.state.lock();
        let ideas = match state.suggestions.pop_front() {
            Some(Suggest::Fail) => return Err(transport("model unavailable")),
            Some(Suggest::Ideas(ideas)) => ideas,
            None => Vec::new(),
        };
        Ok(ideas
            .into_iter()
            .take(request.count as usize)
            .map(|idea| {
                Self::persist(
                    &mut state,
                    NodeContent::Filled(idea.to_string()),
                    NodeState::Ghost,
                    request.position,
                    request.depth,
                    request.order,
                    request.parent_id.clone(),
                )
            })
            .collect())
    }

    async fn update(
        &self,
        _project: &ProjectId,
        node: &NodeId,
        update: NodeUpdate,
    ) -> SyncResult<Node> {
        self.enter("update", Some(node.as_str())).await?;
        self.with_node(node, |n| {
            if let Some(content) = update.content {
                n.content = content;
            }
            if let Some(position) = update.position {
                n.position = position;
            }
            n.clone()
        })
    }

    async fn activate(&self, _project: &ProjectId, node: &NodeId) -> SyncResult<Node> {
        self.enter("activate", Some(node.as_str())).await?;
        self.with_node(node, |n| {
            n.state = NodeState::Active;
            n.clone()
        })
    }

    async fn attach_tag(&self, _project: &ProjectId, tag: &TagId, node: &NodeId) -> SyncResult<()> {
        self.enter("attach_tag", Some(node.as_str())).await?;
        self.with_node(node, |n| {
            n.tags.insert(tag.clone());
        })
    }

    async fn detach_tag(&self, _project: &ProjectId, tag: &TagId, node: &NodeId) -> SyncResult<()> {
        self.enter("detach_tag", Some(node.as_str())).await?;
        self.with_node(node, |n| {
            n.tags.remove(tag);
        })
    }

    async fn delete_node(&self, _project: &ProjectId, node: &NodeId) -> SyncResult<()> {
        self.enter("delete_node", Some(node.as_str())).await?;
        self.state.lock().nodes.retain(|n| &n.id != node);
        Ok(())
    }

    async fn list_tags(&self, _project: &ProjectId) -> SyncResult<Vec<Tag>> {
        self.enter("list_tags", None).await?;
        Ok(self.state.lock().tags.clone())
    }

    async fn create_tag(&self, _project: &ProjectId, draft: TagDraft) -> SyncResult<Tag> {
        self.enter("create_tag", draft.name.as_deref()).await?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let tag = Tag {
            id: tag_id(&format!("t{}", state.next_id)),
            name: draft.name.unwrap_or_default(),
            description: draft.description,
            color: draft.color,
            node_count: 0,
            summary: None,
        };
        state.tags.push(tag.clone());
        Ok(tag)
    }

    async fn update_tag(
        &self,
        _project: &ProjectId,
        tag: &TagId,
        draft: TagDraft,
    ) -> SyncResult<Tag> {
        self.enter("update_tag", Some(tag.as_str())).await?;
        self.with_tag(tag, |t| {
            if let Some(name) = draft.name {
                t.name = name;
            }
            if draft.description.is_some() {
                t.description = draft.description;
            }
            if draft.color.is_some() {
                t.color = draft.color;
            }
            t.clone()
        })
    }

    async fn delete_tag(&self, _project: &ProjectId, tag: &TagId) -> SyncResult<()> {
        self.enter("delete_tag", Some(tag.as_str())).await?;
        let mut state = self.state.lock();
        state.tags.retain(|t| &t.id != tag);
        for node in &mut state.nodes {
            node.tags.remove(tag);
        }
        Ok(())
    }

    async fn refresh_tag_summary(&self, _project: &ProjectId, tag: &TagId) -> SyncResult<Tag> {
        self.enter("refresh_tag_summary", Some(tag.as_str())).await?;
        self.with_tag(tag, |t| {
            t.summary = Some(format!("summary of {}", t.name));
            t.clone()
        })
    }
}

#[derive(Default)]
pub(crate) struct RecordingRenderer {
    log: Mutex<Vec<RenderInstruction>>,
}

impl RecordingRenderer {
    pub(crate) fn all(&self) -> Vec<RenderInstruction> {
        self.log.lock().clone()
    }

    pub(crate) fn take(&self) -> Vec<RenderInstruction> {
        std::mem::take(&mut *self.log.lock())
    }

    pub(crate) fn notices(&self) -> Vec<(NoticeLevel, String)> {
        self.log
            .lock()
            .iter()
            .filter_map(|i| match i {
                RenderInstruction::Notice { level, message } => Some((*level, message.clone())),
                _ => None,
            })
            .collect()
    }
}

impl RenderAdapter for RecordingRenderer {
    fn apply(&self, instruction: RenderInstruction) {
        self.log.lock().push(instruction);
    }
}

/// Answers prompts from a queue; an exhausted queue cancels.
#[derive(Default)]
pub(crate) struct ScriptedPrompt {
    answers: Mutex<VecDeque<Option<String>>>,
    asked: Mutex<Vec<PromptRequest>>,
}

impl ScriptedPrompt {
    pub(crate) fn answer(&self, text: &str) {
        self.answers.lock().push_back(Some(text.to_string()));
    }

    pub(crate) fn cancel(&self) {
        self.answers.lock().push_back(None);
    }

    pub(crate) fn asked(&self) -> Vec<PromptRequest> {
        self.asked.lock().clone()
    }
}

#[async_trait]
impl TextPrompt for ScriptedPrompt {
    async fn ask(&self, request: PromptRequest) -> Option<String> {
        self.asked.lock().push(request);
        self.answers.lock().pop_front().flatten()
    }
}

pub(crate) struct Harness {
    pub(crate) session: Session,
    pub(crate) remote: Arc<MemoryRemote>,
    pub(crate) renderer: Arc<RecordingRenderer>,
    pub(crate) prompt: Arc<ScriptedPrompt>,
}

pub(crate) async fn open(remote: Arc<MemoryRemote>) -> Harness {
    open_with(remote, EngineConfig::default()).await
}

pub(crate) async fn open_with(remote: Arc<MemoryRemote>, config: EngineConfig) -> Harness {
    let renderer = Arc::new(RecordingRenderer::default());
    let prompt = Arc::new(ScriptedPrompt::default());
    let session = Session::open(
        project(),
        remote.clone(),
        renderer.clone(),
        prompt.clone(),
        config,
    )
    .await
    .expect("open session");
    remote.take_calls();
    Harness {
        session,
        remote,
        renderer,
        prompt,
    }
}

/// A single ACTIVE root that has not spawned yet.
pub(crate) fn lone_root(content: &str) -> Arc<MemoryRemote> {
    let remote = MemoryRemote::new();
    remote.seed([node("n1", None, NodeState::Active, Some(content))]);
    remote
}

pub(crate) fn close_to(actual: Position, x: f64, y: f64) -> bool {
    (actual.x - x).abs() < 1e-6 && (actual.y - y).abs() < 1e-6
}
