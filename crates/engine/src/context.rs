#![forbid(unsafe_code)]

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::prompt::TextPrompt;
use crate::render::{NoticeLevel, Projector, RenderAdapter, RenderInstruction};
use parking_lot::Mutex;
use sp_core::{Node, NodeId, NodeStore, ProjectId};
use sp_sync::RemoteSync;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SpawnGate {
    Open,
    InProgress,
    AlreadyGenerated,
    Missing,
}

/// State shared by the lifecycle controller, the tag overlay and the session.
///
/// Locks are only taken for synchronous sections and are never held across an
/// `.await`. Lock order is spawn guard, then store, then projector.
pub struct SessionContext {
    pub(crate) project: ProjectId,
    pub(crate) remote: Arc<dyn RemoteSync>,
    pub(crate) renderer: Arc<dyn RenderAdapter>,
    pub(crate) prompt: Arc<dyn TextPrompt>,
    pub(crate) config: EngineConfig,
    store: Mutex<NodeStore>,
    projector: Arc<Mutex<Projector>>,
    spawning: Mutex<HashSet<NodeId>>,
    closed: Arc<AtomicBool>,
}

impl SessionContext {
    pub(crate) fn new(
        project: ProjectId,
        remote: Arc<dyn RemoteSync>,
        renderer: Arc<dyn RenderAdapter>,
        prompt: Arc<dyn TextPrompt>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let projector: Arc<Mutex<Projector>> = Arc::default();
        let closed = Arc::new(AtomicBool::new(false));
        let mut store = NodeStore::new();
        {
            let projector = projector.clone();
            let renderer = renderer.clone();
            let closed = closed.clone();
            store.subscribe(move |change| {
                let instructions = projector.lock().project(change);
                if closed.load(Ordering::Acquire) {
                    return;
                }
                for instruction in instructions {
                    renderer.apply(instruction);
                }
            });
        }
        Arc::new(Self {
            project,
            remote,
            renderer,
            prompt,
            config,
            store: Mutex::new(store),
            projector,
            spawning: Mutex::new(HashSet::new()),
            closed,
        })
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&NodeStore) -> R) -> R {
        f(&self.store.lock())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut NodeStore) -> R) -> R {
        f(&mut self.store.lock())
    }

    pub(crate) fn with_projector<R>(&self, f: impl FnOnce(&mut Projector) -> R) -> R {
        f(&mut self.projector.lock())
    }

    pub fn node(&self, id: &NodeId) -> Option<Node> {
        self.read(|store| store.get(id).cloned())
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.read(|store| store.all().into_iter().cloned().collect())
    }

    /// Resolves a node an operation is about to act on. Temporary ids and ids
    /// missing from the store abort the operation.
    pub(crate) fn require(&self, op: &'static str, id: &NodeId) -> EngineResult<Node> {
        if id.is_temporary() {
            return Err(EngineError::Consistency {
                op,
                node: id.clone(),
            });
        }
        self.node(id).ok_or_else(|| EngineError::Consistency {
            op,
            node: id.clone(),
        })
    }

    /// Checks and marks a spawn for `id` in one critical section, before the
    /// caller's first await.
    pub(crate) fn begin_spawn(&self, id: &NodeId) -> SpawnGate {
        let mut spawning = self.spawning.lock();
        if spawning.contains(id) {
            return SpawnGate::InProgress;
        }
        match self.read(|store| store.get(id).map(|node| node.generated)) {
            None => SpawnGate::Missing,
            Some(true) => SpawnGate::AlreadyGenerated,
            Some(false) => {
                spawning.insert(id.clone());
                SpawnGate::Open
            }
        }
    }

    /// Must run after `generated` has been committed for a successful spawn.
    pub(crate) fn end_spawn(&self, id: &NodeId) {
        self.spawning.lock().remove(id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Checked after every remote call, before its result touches local state.
    pub(crate) fn ensure_open(&self) -> EngineResult<()> {
        if self.is_closed() {
            return Err(EngineError::SessionClosed);
        }
        Ok(())
    }

    pub(crate) fn render(&self, instruction: RenderInstruction) {
        if !self.is_closed() {
            self.renderer.apply(instruction);
        }
    }

    pub(crate) fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.render(RenderInstruction::Notice {
            level,
            message: message.into(),
        });
    }
}
