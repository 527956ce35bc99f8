use super::*;
use crate::ids::TagId;
use crate::node::{NodeContent, NodeState, Position};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

fn id(value: &str) -> NodeId {
    NodeId::try_new(value).unwrap()
}

fn node(value: &str, parent: Option<&str>, order_index: u32) -> Node {
    Node {
        id: id(value),
        content: NodeContent::Filled(value.to_string()),
        position: Position::default(),
        depth: if parent.is_some() { 1 } else { 0 },
        order_index,
        parent_id: parent.map(id),
        state: NodeState::Active,
        generated: false,
        frozen: false,
        tags: BTreeSet::new(),
    }
}

fn sample_tree() -> NodeStore {
    let mut store = NodeStore::new();
    store.upsert_many([
        node("n1", None, 0),
        node("n5", Some("n1"), 0),
        node("n6", Some("n5"), 1),
        node("n7", Some("n5"), 0),
        node("n8", Some("n7"), 0),
        node("n2", Some("n1"), 1),
    ]);
    store
}

#[test]
fn upsert_keeps_insertion_order_and_replaces_in_place() {
    let mut store = sample_tree();
    let mut renamed = node("n5", Some("n1"), 0);
    renamed.content = NodeContent::Filled("renamed".to_string());
    store.upsert_many([renamed, node("n9", Some("n2"), 0)]);

    let ids: Vec<&str> = store.all().iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, vec!["n1", "n5", "n6", "n7", "n8", "n2", "n9"]);
    assert_eq!(store.get(&id("n5")).unwrap().label(), "renamed");
}

#[test]
fn upsert_never_clears_generated() {
    let mut store = NodeStore::new();
    let mut root = node("n1", None, 0);
    root.generated = true;
    store.upsert_many([root]);
    store.upsert_many([node("n1", None, 0)]);
    assert!(store.get(&id("n1")).unwrap().generated);
}

#[test]
fn patch_unknown_id_is_silent() {
    let mut store = sample_tree();
    let applied = store.patch(
        &id("missing"),
        NodePatch {
            frozen: Some(true),
            ..NodePatch::default()
        },
    );
    assert!(!applied);
    assert_eq!(store.len(), 6);
}

#[test]
fn patch_is_visible_to_the_next_read() {
    let mut store = sample_tree();
    assert!(store.patch(
        &id("n6"),
        NodePatch {
            position: Some(Position::new(10.0, 20.0)),
            state: Some(NodeState::Ghost),
            ..NodePatch::default()
        },
    ));
    let n6 = store.get(&id("n6")).unwrap();
    assert_eq!(n6.position, Position::new(10.0, 20.0));
    assert_eq!(n6.state, NodeState::Ghost);
}

#[test]
fn patch_cannot_reset_generated() {
    let mut store = sample_tree();
    store.patch(
        &id("n5"),
        NodePatch {
            generated: Some(true),
            ..NodePatch::default()
        },
    );
    let changed = store.patch(
        &id("n5"),
        NodePatch {
            generated: Some(false),
            ..NodePatch::default()
        },
    );
    assert!(!changed);
    assert!(store.get(&id("n5")).unwrap().generated);
}

#[test]
fn children_of_is_transitive() {
    let store = sample_tree();
    let ids: Vec<String> = store
        .children_of(&id("n5"))
        .into_iter()
        .map(NodeId::into_string)
        .collect();
    assert_eq!(ids, vec!["n7", "n6", "n8"]);
    assert!(store.children_of(&id("n8")).is_empty());
}

#[test]
fn direct_children_sorted_by_order() {
    let store = sample_tree();
    let kids: Vec<&str> = store
        .direct_children(&id("n5"))
        .iter()
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(kids, vec!["n7", "n6"]);
}

#[test]
fn reparenting_moves_the_reverse_index() {
    let mut store = sample_tree();
    store.upsert_many([node("n8", Some("n2"), 0)]);
    assert!(store.direct_children(&id("n7")).is_empty());
    assert_eq!(store.direct_children(&id("n2")).len(), 1);
}

#[test]
fn well_formed_tree_has_no_issues() {
    let store = sample_tree();
    assert!(store.validate_tree().is_empty());
    assert_eq!(store.root().unwrap().id.as_str(), "n1");
    assert_eq!(store.parent_of(&id("n8")).unwrap().id.as_str(), "n7");
}

#[test]
fn validate_reports_structural_issues() {
    let mut store = NodeStore::new();
    store.upsert_many([
        node("a", None, 0),
        node("b", None, 0),
        node("c", Some("ghost-parent"), 0),
        node("d", Some("e"), 0),
        node("e", Some("d"), 1),
    ]);
    let issues = store.validate_tree();
    assert!(issues.iter().any(|i| matches!(i, TreeIssue::MultipleRoots(r) if r.len() == 2)));
    assert!(issues.contains(&TreeIssue::MissingParent {
        node: id("c"),
        parent: id("ghost-parent"),
    }));
    assert!(issues.contains(&TreeIssue::Cycle { node: id("d") }));
}

#[test]
fn validate_flags_duplicate_sibling_order() {
    let mut store = NodeStore::new();
    store.upsert_many([
        node("r", None, 0),
        node("x", Some("r"), 1),
        node("y", Some("r"), 1),
    ]);
    assert_eq!(
        store.validate_tree(),
        vec![TreeIssue::DuplicateOrder {
            parent: id("r"),
            order_index: 1,
        }]
    );
}

#[test]
fn subscribers_observe_writes_in_order() {
    let mut store = NodeStore::new();
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = seen.clone();
    let sub = store.subscribe(move |change| {
        let kind = match change {
            StoreChange::Inserted(_) => "insert",
            StoreChange::Updated(_) => "update",
        };
        sink.lock()
            .unwrap()
            .push(format!("{kind}:{}:{}", change.node().id, change.node().tags.len()));
    });

    store.upsert_many([node("n1", None, 0)]);
    store.patch(
        &id("n1"),
        NodePatch {
            tags: Some(BTreeSet::from([TagId::try_new("t1").unwrap()])),
            ..NodePatch::default()
        },
    );
    // No-op patch does not notify.
    store.patch(&id("n1"), NodePatch::default());
    assert!(store.unsubscribe(sub));
    store.upsert_many([node("n2", Some("n1"), 0)]);

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["insert:n1:0".to_string(), "update:n1:1".to_string()]
    );
}
