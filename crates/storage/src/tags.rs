#![forbid(unsafe_code)]

use super::nodes::ensure_node;
use super::{SqliteStore, StoreError, next_counter_tx, now_ms};
use rusqlite::{Connection, OptionalExtension, params};
use sp_core::{NodeId, ProjectId, Tag, TagDraft, TagId, normalize_tag_name};

const SUMMARY_NODES: usize = 3;
const EMPTY_SUMMARY: &str = "(empty)";

const TAG_SELECT: &str = r#"
    SELECT t.id, t.name, t.description, t.color, t.summary,
           (SELECT COUNT(*) FROM tag_nodes tn WHERE tn.project=t.project AND tn.tag_id=t.id)
    FROM tags t
"#;

type TagRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    i64,
);

fn read_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<TagRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_tag((id, name, description, color, summary, count): TagRow) -> Result<Tag, StoreError> {
    Ok(Tag {
        id: TagId::try_new(id)?,
        name,
        description,
        color,
        node_count: u32::try_from(count).unwrap_or(u32::MAX),
        summary: summary.filter(|s| !s.is_empty()),
    })
}

impl SqliteStore {
    pub fn load_tags(&self, project: &ProjectId) -> Result<Vec<Tag>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{TAG_SELECT} WHERE t.project=?1 ORDER BY t.rowid ASC"))?;
        let rows = stmt
            .query_map(params![project.as_str()], read_tag)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_tag).collect()
    }

    pub fn insert_tag(&self, project: &ProjectId, draft: TagDraft) -> Result<Tag, StoreError> {
        let name = normalize_tag_name(draft.name.as_deref().unwrap_or_default())?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        ensure_name_free(&tx, project, &name, None)?;
        let seq = next_counter_tx(&tx, project.as_str(), "tag")?;
        let id = format!("t{seq}");
        tx.execute(
            r#"
            INSERT INTO tags(project, id, name, description, color, summary, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6)
            "#,
            params![project.as_str(), id, name, draft.description, draft.color, now_ms()],
        )?;
        tx.commit()?;
        load_tag(&conn, project, &id)
    }

    pub fn edit_tag(
        &self,
        project: &ProjectId,
        tag: &TagId,
        draft: TagDraft,
    ) -> Result<Tag, StoreError> {
        let name = draft.name.as_deref().map(normalize_tag_name).transpose()?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        ensure_tag(&tx, project, tag)?;
        if let Some(name) = name.as_deref() {
            ensure_name_free(&tx, project, name, Some(tag))?;
        }
        tx.execute(
            r#"
            UPDATE tags SET
              name=COALESCE(?3, name),
              description=COALESCE(?4, description),
              color=COALESCE(?5, color)
            WHERE project=?1 AND id=?2
            "#,
            params![project.as_str(), tag.as_str(), name, draft.description, draft.color],
        )?;
        tx.commit()?;
        load_tag(&conn, project, tag.as_str())
    }

    pub fn remove_tag(&self, project: &ProjectId, tag: &TagId) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        ensure_tag(&tx, project, tag)?;
        tx.execute(
            "DELETE FROM tag_nodes WHERE project=?1 AND tag_id=?2",
            params![project.as_str(), tag.as_str()],
        )?;
        tx.execute(
            "DELETE FROM tags WHERE project=?1 AND id=?2",
            params![project.as_str(), tag.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Returns whether a new link was written.
    pub fn link_tag(
        &self,
        project: &ProjectId,
        tag: &TagId,
        node: &NodeId,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        ensure_tag(&conn, project, tag)?;
        ensure_node(&conn, project, node)?;
        let written = conn.execute(
            "INSERT OR IGNORE INTO tag_nodes(project, tag_id, node_id) VALUES (?1, ?2, ?3)",
            params![project.as_str(), tag.as_str(), node.as_str()],
        )?;
        Ok(written > 0)
    }

    /// Returns whether a link was removed.
    pub fn unlink_tag(
        &self,
        project: &ProjectId,
        tag: &TagId,
        node: &NodeId,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        ensure_tag(&conn, project, tag)?;
        let removed = conn.execute(
            "DELETE FROM tag_nodes WHERE project=?1 AND tag_id=?2 AND node_id=?3",
            params![project.as_str(), tag.as_str(), node.as_str()],
        )?;
        Ok(removed > 0)
    }

    /// Summary is the content of the first tagged nodes, one per line.
    pub fn summarize_tag(&self, project: &ProjectId, tag: &TagId) -> Result<Tag, StoreError> {
        let conn = self.conn.lock();
        ensure_tag(&conn, project, tag)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT n.content FROM nodes n
            JOIN tag_nodes tn ON tn.project=n.project AND tn.node_id=n.id
            WHERE n.project=?1 AND tn.tag_id=?2
            ORDER BY n.rowid ASC
            LIMIT ?3
            "#,
        )?;
        let lines = stmt
            .query_map(
                params![project.as_str(), tag.as_str(), SUMMARY_NODES as i64],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;
        let summary = if lines.is_empty() {
            EMPTY_SUMMARY.to_string()
        } else {
            lines.join("\n")
        };
        conn.execute(
            "UPDATE tags SET summary=?3 WHERE project=?1 AND id=?2",
            params![project.as_str(), tag.as_str(), summary],
        )?;
        load_tag(&conn, project, tag.as_str())
    }
}

fn load_tag(conn: &Connection, project: &ProjectId, id: &str) -> Result<Tag, StoreError> {
    let row = conn
        .query_row(
            &format!("{TAG_SELECT} WHERE t.project=?1 AND t.id=?2"),
            params![project.as_str(), id],
            read_tag,
        )
        .optional()?
        .ok_or_else(|| StoreError::UnknownTag(id.to_string()))?;
    into_tag(row)
}

fn ensure_tag(conn: &Connection, project: &ProjectId, tag: &TagId) -> Result<(), StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM tags WHERE project=?1 AND id=?2",
            params![project.as_str(), tag.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(StoreError::UnknownTag(tag.to_string())),
    }
}

fn ensure_name_free(
    conn: &Connection,
    project: &ProjectId,
    name: &str,
    except: Option<&TagId>,
) -> Result<(), StoreError> {
    let holder: Option<String> = conn
        .query_row(
            "SELECT id FROM tags WHERE project=?1 AND name=?2",
            params![project.as_str(), name],
            |row| row.get(0),
        )
        .optional()?;
    match holder {
        Some(id) if except.is_none_or(|tag| tag.as_str() != id) => {
            Err(StoreError::TagNameTaken(name.to_string()))
        }
        _ => Ok(()),
    }
}
