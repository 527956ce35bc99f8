#![forbid(unsafe_code)]

use sp_core::{NodeContent, NodeId, NodeState, Position, ProjectId, TagDraft, TagId};
use sp_storage::{CannedSuggestions, SqliteStore};
use sp_sync::{NewNode, NodeUpdate, RemoteSync, SuggestionRequest, SyncError};
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = base.join(format!("sp_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn project() -> ProjectId {
    ProjectId::try_new("demo").expect("project id")
}

fn root_payload(text: &str) -> NewNode {
    NewNode {
        content: NodeContent::Filled(text.to_string()),
        position: Position::new(300.0, 300.0),
        depth: 0,
        order: 0,
        parent_id: None,
    }
}

fn blank_child(parent: &NodeId, order: u32) -> NewNode {
    NewNode {
        content: NodeContent::Unfilled,
        position: Position::new(300.0, 150.0),
        depth: 1,
        order,
        parent_id: Some(parent.clone()),
    }
}

fn named(name: &str) -> TagDraft {
    TagDraft {
        name: Some(name.to_string()),
        ..TagDraft::default()
    }
}

#[tokio::test]
async fn nodes_round_trip_across_reopen() {
    let dir = temp_dir("nodes_round_trip_across_reopen");
    let project = project();
    {
        let store = SqliteStore::open(&dir).expect("open store");
        let root = store.create(&project, root_payload("Idea")).await.expect("root");
        assert_eq!(root.id.as_str(), "n1");
        assert_eq!(root.state, NodeState::Active);

        let blank = store
            .create(&project, blank_child(&root.id, 1))
            .await
            .expect("blank");
        assert_eq!(blank.state, NodeState::Ghost);
        assert!(blank.content.is_unfilled());

        store
            .update(
                &project,
                &blank.id,
                NodeUpdate {
                    position: Some(Position::new(12.5, -4.0)),
                    ..NodeUpdate::default()
                },
            )
            .await
            .expect("move");
    }

    let store = SqliteStore::open(&dir).expect("reopen store");
    let nodes = store.fetch_all(&project, &[]).await.expect("fetch");
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].label(), "Idea");
    assert_eq!(nodes[1].parent_id.as_ref().map(NodeId::as_str), Some("n1"));
    assert_eq!(nodes[1].order_index, 1);
    assert_eq!(nodes[1].position, Position::new(12.5, -4.0));
    assert!(nodes[1].content.is_unfilled());
}

#[tokio::test]
async fn second_root_and_ghost_parent_are_rejected() {
    let store = SqliteStore::open(temp_dir("second_root_and_ghost_parent")).expect("open store");
    let project = project();
    let root = store.create(&project, root_payload("Idea")).await.expect("root");
    let ghost = store
        .create(&project, blank_child(&root.id, 0))
        .await
        .expect("ghost");

    let err = store
        .create(&project, root_payload("Other"))
        .await
        .expect_err("second root");
    assert!(matches!(err, SyncError::Validation { status: 400, .. }));

    let err = store
        .create(&project, blank_child(&ghost.id, 0))
        .await
        .expect_err("child of ghost");
    assert!(matches!(err, SyncError::Validation { .. }));

    let missing = NodeId::try_new("n99").expect("node id");
    let err = store
        .create(&project, blank_child(&missing, 0))
        .await
        .expect_err("unknown parent");
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[tokio::test]
async fn filling_a_placeholder_confirms_it() {
    let store = SqliteStore::open(temp_dir("filling_a_placeholder_confirms_it")).expect("open store");
    let project = project();
    let root = store.create(&project, root_payload("Idea")).await.expect("root");
    let blank = store
        .create(&project, blank_child(&root.id, 0))
        .await
        .expect("blank");

    let moved = store
        .update(
            &project,
            &blank.id,
            NodeUpdate {
                position: Some(Position::new(1.0, 2.0)),
                ..NodeUpdate::default()
            },
        )
        .await
        .expect("move");
    assert_eq!(moved.state, NodeState::Ghost);

    let filled = store
        .update(
            &project,
            &blank.id,
            NodeUpdate {
                content: Some(NodeContent::Filled("Q1 revenue".to_string())),
                ..NodeUpdate::default()
            },
        )
        .await
        .expect("fill");
    assert_eq!(filled.state, NodeState::Active);
    assert_eq!(filled.label(), "Q1 revenue");

    let child = store
        .create(&project, blank_child(&filled.id, 0))
        .await
        .expect("child of the confirmed placeholder");
    assert_eq!(child.parent_id.as_ref(), Some(&filled.id));
}

#[tokio::test]
async fn activate_requires_ghost() {
    let store = SqliteStore::open(temp_dir("activate_requires_ghost")).expect("open store");
    let project = project();
    let root = store.create(&project, root_payload("Idea")).await.expect("root");
    let ghost = store
        .create(&project, blank_child(&root.id, 0))
        .await
        .expect("ghost");

    let active = store.activate(&project, &ghost.id).await.expect("activate");
    assert_eq!(active.state, NodeState::Active);

    let err = store
        .activate(&project, &ghost.id)
        .await
        .expect_err("already active");
    match err {
        SyncError::Validation { status, detail } => {
            assert_eq!(status, 400);
            assert_eq!(detail, "Node is not in GHOST state");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn tag_links_are_idempotent_and_inherited() {
    let store = SqliteStore::open(temp_dir("tag_links_idempotent")).expect("open store");
    let project = project();
    let root = store.create(&project, root_payload("Idea")).await.expect("root");
    let tag = store.create_tag(&project, named("  Q1   goals ")).await.expect("tag");
    assert_eq!(tag.name, "Q1 goals");

    store.attach_tag(&project, &tag.id, &root.id).await.expect("attach");
    store
        .attach_tag(&project, &tag.id, &root.id)
        .await
        .expect("attach again");

    let child = store
        .create(&project, blank_child(&root.id, 0))
        .await
        .expect("child");
    assert!(child.has_tag(&tag.id));

    let tags = store.list_tags(&project).await.expect("tags");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].node_count, 2);

    store.detach_tag(&project, &tag.id, &child.id).await.expect("detach");
    store
        .detach_tag(&project, &tag.id, &child.id)
        .await
        .expect("detach again");

    let filtered = store
        .fetch_all(&project, std::slice::from_ref(&tag.id))
        .await
        .expect("filtered");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, root.id);

    let unknown = TagId::try_new("t404").expect("tag id");
    let err = store
        .attach_tag(&project, &unknown, &root.id)
        .await
        .expect_err("unknown tag");
    assert!(matches!(err, SyncError::NotFound(detail) if detail == "Tag not found"));
}

#[tokio::test]
async fn tag_catalog_edits_and_summary() {
    let store = SqliteStore::open(temp_dir("tag_catalog_edits")).expect("open store");
    let project = project();
    let root = store.create(&project, root_payload("Idea")).await.expect("root");
    let first = store.create_tag(&project, named("alpha")).await.expect("alpha");
    let second = store.create_tag(&project, named("beta")).await.expect("beta");

    let err = store
        .create_tag(&project, named("alpha"))
        .await
        .expect_err("duplicate");
    assert!(matches!(err, SyncError::Validation { status: 409, .. }));
    let err = store
        .update_tag(&project, &second.id, named("alpha"))
        .await
        .expect_err("rename onto existing");
    assert!(matches!(err, SyncError::Validation { status: 409, .. }));

    let recolored = store
        .update_tag(
            &project,
            &first.id,
            TagDraft {
                color: Some("#FF851B".to_string()),
                ..TagDraft::default()
            },
        )
        .await
        .expect("recolor");
    assert_eq!(recolored.name, "alpha");
    assert_eq!(recolored.color.as_deref(), Some("#FF851B"));

    let empty = store
        .refresh_tag_summary(&project, &first.id)
        .await
        .expect("empty summary");
    assert_eq!(empty.summary.as_deref(), Some("(empty)"));

    store.attach_tag(&project, &first.id, &root.id).await.expect("attach");
    let summary = store
        .refresh_tag_summary(&project, &first.id)
        .await
        .expect("summary");
    assert_eq!(summary.summary.as_deref(), Some("Idea"));

    store.delete_tag(&project, &first.id).await.expect("delete tag");
    let nodes = store.fetch_all(&project, &[]).await.expect("fetch");
    assert!(nodes[0].tags.is_empty());
    assert_eq!(store.list_tags(&project).await.expect("tags").len(), 1);
}

#[tokio::test]
async fn suggestions_come_from_the_suggester() {
    let store = SqliteStore::open(temp_dir("suggestions_from_suggester"))
        .expect("open store")
        .with_suggester(CannedSuggestions::new(["Price tiers"]));
    let project = project();
    let root = store.create(&project, root_payload("Launch Plan")).await.expect("root");

    let request = |order| SuggestionRequest {
        prompt: "Launch Plan".to_string(),
        position: Position::new(300.0, 150.0),
        depth: 1,
        order,
        parent_id: Some(root.id.clone()),
        count: 1,
    };
    let first = store
        .create_ai_suggestions(&project, request(0))
        .await
        .expect("first");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].label(), "Price tiers");
    assert_eq!(first[0].state, NodeState::Ghost);

    let second = store
        .create_ai_suggestions(&project, request(1))
        .await
        .expect("second");
    assert!(second.is_empty());
}

#[tokio::test]
async fn delete_node_only_removes_leaves() {
    let store = SqliteStore::open(temp_dir("delete_node_leaves")).expect("open store");
    let project = project();
    let root = store.create(&project, root_payload("Idea")).await.expect("root");
    let leaf = store
        .create(&project, blank_child(&root.id, 0))
        .await
        .expect("leaf");

    let err = store
        .delete_node(&project, &root.id)
        .await
        .expect_err("root has children");
    assert!(matches!(err, SyncError::Validation { .. }));

    store.delete_node(&project, &leaf.id).await.expect("delete leaf");
    assert_eq!(store.fetch_all(&project, &[]).await.expect("fetch").len(), 1);
}
