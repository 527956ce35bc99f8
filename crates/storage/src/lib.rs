#![forbid(unsafe_code)]

//! Local SQLite backend for a Sprout project.
//!
//! `SqliteStore` honors the same contract as the REST service: plain nodes
//! get a permanent `n{seq}` id, children inherit their parent's tags, tag
//! links are idempotent and AI suggestions come from a [`Suggester`].

mod error;
mod nodes;
mod remote;
mod suggest;
mod tags;

pub use error::StoreError;
pub use suggest::{CannedSuggestions, NoSuggestions, Suggester};

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;

const DB_FILE: &str = "sprout.db";
const SCHEMA_VERSION: &str = "1";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    storage_dir: PathBuf,
    suggester: Box<dyn Suggester>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("storage_dir", &self.storage_dir)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            storage_dir,
            suggester: Box::new(NoSuggestions),
        })
    }

    pub fn with_suggester(mut self, suggester: impl Suggester + 'static) -> Self {
        self.suggester = Box::new(suggester);
        self
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS counters (
          project TEXT NOT NULL,
          name TEXT NOT NULL,
          value INTEGER NOT NULL,
          PRIMARY KEY (project, name)
        );

        CREATE TABLE IF NOT EXISTS nodes (
          project TEXT NOT NULL,
          id TEXT NOT NULL,
          content TEXT NOT NULL,
          state TEXT NOT NULL,
          pos_x REAL NOT NULL,
          pos_y REAL NOT NULL,
          depth INTEGER NOT NULL,
          order_index INTEGER NOT NULL,
          parent_id TEXT,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL,
          PRIMARY KEY (project, id)
        );

        CREATE TABLE IF NOT EXISTS tags (
          project TEXT NOT NULL,
          id TEXT NOT NULL,
          name TEXT NOT NULL,
          description TEXT,
          color TEXT,
          summary TEXT,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (project, id),
          UNIQUE (project, name)
        );

        CREATE TABLE IF NOT EXISTS tag_nodes (
          project TEXT NOT NULL,
          tag_id TEXT NOT NULL,
          node_id TEXT NOT NULL,
          PRIMARY KEY (project, tag_id, node_id),
          FOREIGN KEY (project, tag_id) REFERENCES tags(project, id) ON DELETE CASCADE,
          FOREIGN KEY (project, node_id) REFERENCES nodes(project, id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(project, parent_id);
        CREATE INDEX IF NOT EXISTS idx_tag_nodes_node ON tag_nodes(project, node_id);
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", SCHEMA_VERSION],
    )?;
    Ok(())
}

fn now_ms() -> i64 {
    let ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000i128;
    i64::try_from(ms.max(0)).unwrap_or(i64::MAX)
}

fn next_counter_tx(tx: &Transaction<'_>, project: &str, name: &str) -> Result<i64, StoreError> {
    let current: i64 = tx
        .query_row(
            "SELECT value FROM counters WHERE project=?1 AND name=?2",
            params![project, name],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);
    let next = current + 1;
    tx.execute(
        r#"
        INSERT INTO counters(project, name, value) VALUES (?1, ?2, ?3)
        ON CONFLICT(project, name) DO UPDATE SET value=excluded.value
        "#,
        params![project, name, next],
    )?;
    Ok(next)
}
