#![forbid(unsafe_code)]

use super::{SqliteStore, StoreError, next_counter_tx, now_ms};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use sp_core::{Node, NodeContent, NodeId, NodeState, Position, ProjectId, TagId};
use sp_sync::{NewNode, NodeUpdate, SuggestionRequest};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

struct NodeRow {
    id: String,
    content: String,
    state: String,
    pos_x: f64,
    pos_y: f64,
    depth: i64,
    order_index: i64,
    parent_id: Option<String>,
}

impl NodeRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            state: row.get(2)?,
            pos_x: row.get(3)?,
            pos_y: row.get(4)?,
            depth: row.get(5)?,
            order_index: row.get(6)?,
            parent_id: row.get(7)?,
        })
    }

    fn into_node(self, tags: BTreeSet<TagId>) -> Result<Node, StoreError> {
        let state = NodeState::parse(&self.state).ok_or_else(|| {
            StoreError::CorruptRow(format!("unknown state {:?} on node {}", self.state, self.id))
        })?;
        let depth = u32::try_from(self.depth)
            .map_err(|_| StoreError::CorruptRow(format!("depth out of range on node {}", self.id)))?;
        let order_index = u32::try_from(self.order_index)
            .map_err(|_| StoreError::CorruptRow(format!("order out of range on node {}", self.id)))?;
        Ok(Node {
            id: NodeId::try_new(self.id)?,
            content: NodeContent::from_wire(&self.content),
            position: Position::new(self.pos_x, self.pos_y),
            depth,
            order_index,
            parent_id: self.parent_id.map(NodeId::try_new).transpose()?,
            state,
            generated: false,
            frozen: false,
            tags,
        })
    }
}

const NODE_COLUMNS: &str = "id, content, state, pos_x, pos_y, depth, order_index, parent_id";

/// Fields written for one new node row.
pub(crate) struct NodeInsert<'a> {
    pub content: &'a NodeContent,
    pub state: NodeState,
    pub position: Position,
    pub depth: u32,
    pub order: u32,
    pub parent_id: Option<&'a NodeId>,
}

impl SqliteStore {
    /// Nodes in creation order. A non-empty filter keeps nodes carrying any
    /// of the listed tags.
    pub fn load_nodes(
        &self,
        project: &ProjectId,
        tag_filter: &[TagId],
    ) -> Result<Vec<Node>, StoreError> {
        let conn = self.conn.lock();
        let mut links = tag_links(&conn, project)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE project=?1 ORDER BY rowid ASC"
        ))?;
        let rows = stmt
            .query_map(params![project.as_str()], NodeRow::read)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let tags = links.remove(&row.id).unwrap_or_default();
            if !tag_filter.is_empty() && !tag_filter.iter().any(|t| tags.contains(t)) {
                continue;
            }
            out.push(row.into_node(tags)?);
        }
        Ok(out)
    }

    /// Plain create. Unfilled content is stored as a GHOST placeholder,
    /// anything else as ACTIVE.
    pub fn insert_node(&self, project: &ProjectId, payload: NewNode) -> Result<Node, StoreError> {
        let state = if payload.content.is_unfilled() {
            NodeState::Ghost
        } else {
            NodeState::Active
        };
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let id = insert_node_tx(
            &tx,
            project,
            NodeInsert {
                content: &payload.content,
                state,
                position: payload.position,
                depth: payload.depth,
                order: payload.order,
                parent_id: payload.parent_id.as_ref(),
            },
        )?;
        tx.commit()?;
        load_node(&conn, project, &id)
    }

    /// Persists whatever the suggester offers as GHOST children, in order.
    pub fn insert_suggestions(
        &self,
        project: &ProjectId,
        request: SuggestionRequest,
    ) -> Result<Vec<Node>, StoreError> {
        let ideas = self.suggester.suggest(&request.prompt, request.count);
        debug!(requested = request.count, offered = ideas.len(), "local suggestions");
        if ideas.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(ideas.len());
        for (offset, idea) in ideas.into_iter().enumerate() {
            let content = NodeContent::from_wire(&idea);
            if content.is_unfilled() {
                continue;
            }
            let order = request
                .order
                .saturating_add(u32::try_from(offset).unwrap_or(u32::MAX));
            ids.push(insert_node_tx(
                &tx,
                project,
                NodeInsert {
                    content: &content,
                    state: NodeState::Ghost,
                    position: request.position,
                    depth: request.depth,
                    order,
                    parent_id: request.parent_id.as_ref(),
                },
            )?);
        }
        tx.commit()?;
        ids.iter().map(|id| load_node(&conn, project, id)).collect()
    }

    /// Content and position edit. Filling an unfilled GHOST placeholder also
    /// makes it ACTIVE.
    pub fn edit_node(
        &self,
        project: &ProjectId,
        node: &NodeId,
        update: NodeUpdate,
    ) -> Result<Node, StoreError> {
        let conn = self.conn.lock();
        let current = load_node(&conn, project, node.as_str())?;
        let fills_placeholder = current.state == NodeState::Ghost
            && current.content.is_unfilled()
            && update.content.as_ref().is_some_and(|c| !c.is_unfilled());
        let state = fills_placeholder.then(|| NodeState::Active.as_str());
        let content = update.content.as_ref().map(|c| c.as_wire().to_string());
        conn.execute(
            r#"
            UPDATE nodes SET
              content=COALESCE(?3, content),
              pos_x=COALESCE(?4, pos_x),
              pos_y=COALESCE(?5, pos_y),
              state=COALESCE(?6, state),
              updated_at_ms=?7
            WHERE project=?1 AND id=?2
            "#,
            params![
                project.as_str(),
                node.as_str(),
                content,
                update.position.map(|p| p.x),
                update.position.map(|p| p.y),
                state,
                now_ms(),
            ],
        )?;
        load_node(&conn, project, node.as_str())
    }

    pub fn activate_node(&self, project: &ProjectId, node: &NodeId) -> Result<Node, StoreError> {
        let conn = self.conn.lock();
        let current = load_node(&conn, project, node.as_str())?;
        if current.state != NodeState::Ghost {
            return Err(StoreError::NotGhost(node.to_string()));
        }
        conn.execute(
            "UPDATE nodes SET state=?3, updated_at_ms=?4 WHERE project=?1 AND id=?2",
            params![
                project.as_str(),
                node.as_str(),
                NodeState::Active.as_str(),
                now_ms()
            ],
        )?;
        load_node(&conn, project, node.as_str())
    }

    /// Removes a leaf node and its tag links.
    pub fn remove_node(&self, project: &ProjectId, node: &NodeId) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        ensure_node(&tx, project, node)?;
        let children: i64 = tx.query_row(
            "SELECT COUNT(*) FROM nodes WHERE project=?1 AND parent_id=?2",
            params![project.as_str(), node.as_str()],
            |row| row.get(0),
        )?;
        if children > 0 {
            return Err(StoreError::HasChildren(node.to_string()));
        }
        tx.execute(
            "DELETE FROM tag_nodes WHERE project=?1 AND node_id=?2",
            params![project.as_str(), node.as_str()],
        )?;
        tx.execute(
            "DELETE FROM nodes WHERE project=?1 AND id=?2",
            params![project.as_str(), node.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Inserts one row and copies the parent's tag links onto it.
///
/// A project holds at most one root, and only ACTIVE nodes take children.
pub(crate) fn insert_node_tx(
    tx: &Transaction<'_>,
    project: &ProjectId,
    insert: NodeInsert<'_>,
) -> Result<String, StoreError> {
    match insert.parent_id {
        Some(parent) => {
            let state: Option<String> = tx
                .query_row(
                    "SELECT state FROM nodes WHERE project=?1 AND id=?2",
                    params![project.as_str(), parent.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            match state.as_deref().and_then(NodeState::parse) {
                None => return Err(StoreError::UnknownNode(parent.to_string())),
                Some(NodeState::Ghost) => {
                    return Err(StoreError::InvalidInput("ghost nodes cannot have children"));
                }
                Some(NodeState::Active) => {}
            }
        }
        None => {
            let roots: i64 = tx.query_row(
                "SELECT COUNT(*) FROM nodes WHERE project=?1 AND parent_id IS NULL",
                params![project.as_str()],
                |row| row.get(0),
            )?;
            if roots > 0 {
                return Err(StoreError::InvalidInput("project already has a root"));
            }
        }
    }

    let seq = next_counter_tx(tx, project.as_str(), "node")?;
    let id = format!("n{seq}");
    let now = now_ms();
    tx.execute(
        r#"
        INSERT INTO nodes(project, id, content, state, pos_x, pos_y, depth, order_index,
                          parent_id, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
        "#,
        params![
            project.as_str(),
            id,
            insert.content.as_wire(),
            insert.state.as_str(),
            insert.position.x,
            insert.position.y,
            insert.depth,
            insert.order,
            insert.parent_id.map(NodeId::as_str),
            now,
        ],
    )?;

    if let Some(parent) = insert.parent_id {
        tx.execute(
            r#"
            INSERT OR IGNORE INTO tag_nodes(project, tag_id, node_id)
            SELECT project, tag_id, ?3 FROM tag_nodes WHERE project=?1 AND node_id=?2
            "#,
            params![project.as_str(), parent.as_str(), id],
        )?;
    }
    Ok(id)
}

pub(crate) fn ensure_node(
    conn: &Connection,
    project: &ProjectId,
    node: &NodeId,
) -> Result<(), StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM nodes WHERE project=?1 AND id=?2",
            params![project.as_str(), node.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::UnknownNode(node.to_string())),
    }
}

fn load_node(conn: &Connection, project: &ProjectId, id: &str) -> Result<Node, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE project=?1 AND id=?2"),
            params![project.as_str(), id],
            NodeRow::read,
        )
        .optional()?
        .ok_or_else(|| StoreError::UnknownNode(id.to_string()))?;

    let mut stmt = conn.prepare(
        "SELECT tag_id FROM tag_nodes WHERE project=?1 AND node_id=?2 ORDER BY tag_id ASC",
    )?;
    let tags = stmt
        .query_map(params![project.as_str(), id], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(TagId::try_new)
        .collect::<Result<BTreeSet<_>, _>>()?;
    row.into_node(tags)
}

fn tag_links(
    conn: &Connection,
    project: &ProjectId,
) -> Result<HashMap<String, BTreeSet<TagId>>, StoreError> {
    let mut stmt = conn.prepare("SELECT node_id, tag_id FROM tag_nodes WHERE project=?1")?;
    let pairs = stmt
        .query_map(params![project.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let mut out: HashMap<String, BTreeSet<TagId>> = HashMap::new();
    for (node, tag) in pairs {
        out.entry(node).or_default().insert(TagId::try_new(tag)?);
    }
    Ok(out)
}
