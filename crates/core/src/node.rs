#![forbid(unsafe_code)]

use crate::ids::{NodeId, TagId};
use std::collections::BTreeSet;

/// Wire sentinel for a placeholder that still waits for user text.
pub const UNFILLED_SENTINEL: &str = "?";

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
    Active,
    Ghost,
}

impl NodeState {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Active => "ACTIVE",
            NodeState::Ghost => "GHOST",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(NodeState::Active),
            "GHOST" => Some(NodeState::Ghost),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeContent {
    Unfilled,
    Filled(String),
}

impl NodeContent {
    /// Maps the wire representation; blank text counts as unfilled.
    pub fn from_wire(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == UNFILLED_SENTINEL {
            NodeContent::Unfilled
        } else {
            NodeContent::Filled(value.to_string())
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            NodeContent::Unfilled => UNFILLED_SENTINEL,
            NodeContent::Filled(text) => text.as_str(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            NodeContent::Unfilled => None,
            NodeContent::Filled(text) => Some(text.as_str()),
        }
    }

    pub fn is_unfilled(&self) -> bool {
        matches!(self, NodeContent::Unfilled)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub content: NodeContent,
    pub position: Position,
    pub depth: u32,
    pub order_index: u32,
    pub parent_id: Option<NodeId>,
    pub state: NodeState,
    pub generated: bool,
    pub frozen: bool,
    pub tags: BTreeSet<TagId>,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_ghost(&self) -> bool {
        self.state == NodeState::Ghost
    }

    pub fn label(&self) -> &str {
        self.content.as_wire()
    }

    pub fn has_tag(&self, tag: &TagId) -> bool {
        self.tags.contains(tag)
    }
}

/// Partial update applied through `NodeStore::patch`. `None` leaves a field as-is.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodePatch {
    pub content: Option<NodeContent>,
    pub position: Option<Position>,
    pub state: Option<NodeState>,
    pub generated: Option<bool>,
    pub frozen: Option<bool>,
    pub tags: Option<BTreeSet<TagId>>,
}

impl NodePatch {
    pub fn is_empty(&self) -> bool {
        self == &NodePatch::default()
    }

    pub(crate) fn apply(self, node: &mut Node) -> bool {
        let mut changed = false;
        if let Some(content) = self.content
            && node.content != content
        {
            node.content = content;
            changed = true;
        }
        if let Some(position) = self.position
            && node.position != position
        {
            node.position = position;
            changed = true;
        }
        if let Some(state) = self.state
            && node.state != state
        {
            node.state = state;
            changed = true;
        }
        // `generated` is monotonic: a patch can set it, never clear it.
        if self.generated == Some(true) && !node.generated {
            node.generated = true;
            changed = true;
        }
        if let Some(frozen) = self.frozen
            && node.frozen != frozen
        {
            node.frozen = frozen;
            changed = true;
        }
        if let Some(tags) = self.tags
            && node.tags != tags
        {
            node.tags = tags;
            changed = true;
        }
        changed
    }
}
