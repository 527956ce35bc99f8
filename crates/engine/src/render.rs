#![forbid(unsafe_code)]

//! The rendering seam.
//!
//! The engine never talks to a drawing library. It emits [`RenderInstruction`]s
//! through an injected [`RenderAdapter`] and receives [`GestureEvent`]s back
//! through [`crate::Session::handle`].

use sp_core::{Node, NodeId, NodeState, NodeStyle, Position, StoreChange, TagId, style_for};
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderInstruction {
    AddNode {
        id: NodeId,
        label: String,
        position: Position,
        style: NodeStyle,
    },
    AddEdge {
        id: String,
        source: NodeId,
        target: NodeId,
    },
    UpdateStyle {
        id: NodeId,
        opacity: f32,
        highlighted: bool,
    },
    UpdateLabel {
        id: NodeId,
        text: String,
    },
    UpdatePosition {
        id: NodeId,
        position: Position,
    },
    /// Visible, non-fatal notification.
    Notice {
        level: NoticeLevel,
        message: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum GestureEvent {
    Tap(NodeId),
    RightClick { node: NodeId, screen: Position },
    DragEnd { node: NodeId, position: Position },
}

/// Receives instructions synchronously, in emission order.
///
/// `apply` may be called while engine state is locked, so an adapter must not
/// call back into the session from inside it.
pub trait RenderAdapter: Send + Sync {
    fn apply(&self, instruction: RenderInstruction);
}

pub fn edge_id(source: &NodeId, target: &NodeId) -> String {
    format!("e-{source}-{target}")
}

struct View {
    label: String,
    position: Position,
    state: NodeState,
}

impl View {
    fn of(node: &Node) -> Self {
        Self {
            label: node.label().to_string(),
            position: node.position,
            state: node.state,
        }
    }
}

/// Turns store changes into the minimal instruction stream by remembering
/// what the adapter was last told about each node.
#[derive(Default)]
pub(crate) struct Projector {
    views: HashMap<NodeId, View>,
    selected: Option<TagId>,
    highlighted: BTreeSet<NodeId>,
}

impl Projector {
    pub(crate) fn project(&mut self, change: &StoreChange<'_>) -> Vec<RenderInstruction> {
        let node = change.node();
        let mut out = Vec::new();
        let mut restyle = false;

        match self.views.get_mut(&node.id) {
            None => {
                self.views.insert(node.id.clone(), View::of(node));
                out.push(RenderInstruction::AddNode {
                    id: node.id.clone(),
                    label: node.label().to_string(),
                    position: node.position,
                    style: style_for(node.state),
                });
                if let Some(parent) = &node.parent_id {
                    out.push(RenderInstruction::AddEdge {
                        id: edge_id(parent, &node.id),
                        source: parent.clone(),
                        target: node.id.clone(),
                    });
                }
            }
            Some(view) => {
                if view.label != node.label() {
                    view.label = node.label().to_string();
                    out.push(RenderInstruction::UpdateLabel {
                        id: node.id.clone(),
                        text: view.label.clone(),
                    });
                }
                if view.position != node.position {
                    view.position = node.position;
                    out.push(RenderInstruction::UpdatePosition {
                        id: node.id.clone(),
                        position: node.position,
                    });
                }
                if view.state != node.state {
                    view.state = node.state;
                    restyle = true;
                }
            }
        }

        let lit = self.selected.as_ref().is_some_and(|tag| node.has_tag(tag));
        if lit != self.highlighted.contains(&node.id) {
            if lit {
                self.highlighted.insert(node.id.clone());
            } else {
                self.highlighted.remove(&node.id);
            }
            restyle = true;
        }
        if restyle {
            out.push(RenderInstruction::UpdateStyle {
                id: node.id.clone(),
                opacity: style_for(node.state).opacity,
                highlighted: lit,
            });
        }
        out
    }

    /// Replaces the highlight selection. Only nodes whose highlight flips are
    /// restyled.
    pub(crate) fn select(
        &mut self,
        tag: Option<TagId>,
        lit: BTreeSet<NodeId>,
    ) -> Vec<RenderInstruction> {
        let flipped: Vec<NodeId> = self
            .highlighted
            .symmetric_difference(&lit)
            .cloned()
            .collect();
        self.selected = tag;
        self.highlighted = lit;

        flipped
            .into_iter()
            .filter_map(|id| {
                let view = self.views.get(&id)?;
                Some(RenderInstruction::UpdateStyle {
                    highlighted: self.highlighted.contains(&id),
                    opacity: style_for(view.state).opacity,
                    id,
                })
            })
            .collect()
    }

    pub(crate) fn selected(&self) -> Option<&TagId> {
        self.selected.as_ref()
    }

    pub(crate) fn highlighted(&self) -> &BTreeSet<NodeId> {
        &self.highlighted
    }
}
