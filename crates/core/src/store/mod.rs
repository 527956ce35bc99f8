#![forbid(unsafe_code)]

//! The single in-memory source of truth for a project's tree.
//!
//! Every consumer reads through [`NodeStore`]; nobody keeps a private copy of
//! a node across an event. Writers get synchronous change notification via
//! [`NodeStore::subscribe`], delivered after the write has landed, so a
//! subscriber always observes the new state.

use crate::ids::NodeId;
use crate::node::{Node, NodePatch};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StoreChange<'a> {
    Inserted(&'a Node),
    Updated(&'a Node),
}

impl StoreChange<'_> {
    pub fn node(&self) -> &Node {
        match self {
            StoreChange::Inserted(node) | StoreChange::Updated(node) => node,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&StoreChange<'_>) + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeIssue {
    NoRoot,
    MultipleRoots(Vec<NodeId>),
    MissingParent { node: NodeId, parent: NodeId },
    Cycle { node: NodeId },
    DuplicateOrder { parent: NodeId, order_index: u32 },
    GhostWithChildren { node: NodeId },
}

impl TreeIssue {
    pub fn message(&self) -> String {
        match self {
            Self::NoRoot => "tree has no root".to_string(),
            Self::MultipleRoots(ids) => format!("tree has {} roots", ids.len()),
            Self::MissingParent { node, parent } => {
                format!("node {node} references unknown parent {parent}")
            }
            Self::Cycle { node } => format!("node {node} is part of a parent cycle"),
            Self::DuplicateOrder {
                parent,
                order_index,
            } => format!("children of {parent} share order_index {order_index}"),
            Self::GhostWithChildren { node } => format!("ghost node {node} has children"),
        }
    }
}

#[derive(Default)]
pub struct NodeStore {
    order: Vec<NodeId>,
    nodes: HashMap<NodeId, Node>,
    children: HashMap<NodeId, Vec<NodeId>>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
}

impl std::fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore")
            .field("nodes", &self.order.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl NodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Nodes in insertion order.
    pub fn all(&self) -> Vec<&Node> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn root(&self) -> Option<&Node> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .find(|node| node.parent_id.is_none())
    }

    pub fn parent_of(&self, id: &NodeId) -> Option<&Node> {
        let parent_id = self.nodes.get(id)?.parent_id.as_ref()?;
        self.nodes.get(parent_id)
    }

    /// Insert-or-replace by id. New ids keep their arrival order; replaced ids
    /// keep their original slot. Returns the number of nodes written.
    pub fn upsert_many(&mut self, nodes: impl IntoIterator<Item = Node>) -> usize {
        let mut written = Vec::new();
        for mut node in nodes {
            let id = node.id.clone();
            let inserted = match self.nodes.remove(&id) {
                Some(previous) => {
                    node.generated |= previous.generated;
                    if previous.parent_id != node.parent_id {
                        self.unlink_child(previous.parent_id.as_ref(), &id);
                        self.link_child(node.parent_id.as_ref(), &id);
                    }
                    false
                }
                None => {
                    self.order.push(id.clone());
                    self.link_child(node.parent_id.as_ref(), &id);
                    true
                }
            };
            self.nodes.insert(id.clone(), node);
            written.push((id, inserted));
        }
        for (id, inserted) in &written {
            if let Some(node) = self.nodes.get(id) {
                let change = if *inserted {
                    StoreChange::Inserted(node)
                } else {
                    StoreChange::Updated(node)
                };
                self.notify(&change);
            }
        }
        written.len()
    }

    /// Applies a partial update. Unknown ids are ignored; callers that need a
    /// hard failure must check `contains` first. Returns whether anything changed.
    pub fn patch(&mut self, id: &NodeId, patch: NodePatch) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if !patch.apply(node) {
            return false;
        }
        if let Some(node) = self.nodes.get(id) {
            self.notify(&StoreChange::Updated(node));
        }
        true
    }

    /// Immediate children ordered by `order_index`.
    pub fn direct_children(&self, id: &NodeId) -> Vec<&Node> {
        let mut out: Vec<&Node> = self
            .children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.nodes.get(child))
            .collect();
        out.sort_by_key(|node| node.order_index);
        out
    }

    /// Every node whose ancestor chain includes `id`, breadth first.
    /// `id` itself is not part of the result.
    pub fn children_of(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(id.clone());
        let mut queue = VecDeque::from([id.clone()]);
        while let Some(current) = queue.pop_front() {
            for child in self.direct_children(&current) {
                if seen.insert(child.id.clone()) {
                    out.push(child.id.clone());
                    queue.push_back(child.id.clone());
                }
            }
        }
        out
    }

    pub fn subscribe(
        &mut self,
        callback: impl Fn(&StoreChange<'_>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }

    /// Structural checks over the whole tree. An empty store has no issues.
    pub fn validate_tree(&self) -> Vec<TreeIssue> {
        let mut issues = Vec::new();
        if self.order.is_empty() {
            return issues;
        }

        let roots: Vec<NodeId> = self
            .all()
            .into_iter()
            .filter(|node| node.parent_id.is_none())
            .map(|node| node.id.clone())
            .collect();
        match roots.len() {
            0 => issues.push(TreeIssue::NoRoot),
            1 => {}
            _ => issues.push(TreeIssue::MultipleRoots(roots)),
        }

        for node in self.all() {
            let Some(parent) = node.parent_id.as_ref() else {
                continue;
            };
            if !self.nodes.contains_key(parent) {
                issues.push(TreeIssue::MissingParent {
                    node: node.id.clone(),
                    parent: parent.clone(),
                });
            }
            if self.has_cycle_from(&node.id) {
                issues.push(TreeIssue::Cycle {
                    node: node.id.clone(),
                });
            }
        }

        for (parent, kids) in &self.children {
            let Some(parent_node) = self.nodes.get(parent) else {
                continue;
            };
            if parent_node.is_ghost() && !kids.is_empty() {
                issues.push(TreeIssue::GhostWithChildren {
                    node: parent.clone(),
                });
            }
            let mut seen: BTreeMap<u32, usize> = BTreeMap::new();
            for kid in kids.iter().filter_map(|id| self.nodes.get(id)) {
                *seen.entry(kid.order_index).or_default() += 1;
            }
            for (order_index, count) in seen {
                if count > 1 {
                    issues.push(TreeIssue::DuplicateOrder {
                        parent: parent.clone(),
                        order_index,
                    });
                }
            }
        }
        issues
    }

    fn has_cycle_from(&self, start: &NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(start);
        while let Some(id) = current {
            if !seen.insert(id) {
                return true;
            }
            current = self.nodes.get(id).and_then(|node| node.parent_id.as_ref());
        }
        false
    }

    fn link_child(&mut self, parent: Option<&NodeId>, child: &NodeId) {
        if let Some(parent) = parent {
            let kids = self.children.entry(parent.clone()).or_default();
            if !kids.contains(child) {
                kids.push(child.clone());
            }
        }
    }

    fn unlink_child(&mut self, parent: Option<&NodeId>, child: &NodeId) {
        if let Some(parent) = parent
            && let Some(kids) = self.children.get_mut(parent)
        {
            kids.retain(|id| id != child);
        }
    }

    fn notify(&self, change: &StoreChange<'_>) {
        for (_, callback) in &self.subscribers {
            callback(change);
        }
    }
}

#[cfg(test)]
mod tests;
