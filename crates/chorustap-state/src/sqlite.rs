use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use chorustap_core::CursorValue;
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::{debug, info};

use crate::error::StateResult;
use crate::{BookmarkStore, Bookmarks, FlushPlan};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS bookmarks (
    stream TEXT PRIMARY KEY,
    cursor_json TEXT NOT NULL,
    updated_at TEXT DEFAULT CURRENT_TIMESTAMP
)";

/// SQLite-backed state store.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
    bookmarks: Bookmarks,
}

impl SqliteStateStore {
    /// Open or create a state store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StateResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening state store");

        Self::from_connection(Connection::open(path)?)
    }

    /// Create an in-memory state store (for testing).
    pub fn in_memory() -> StateResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StateResult<Self> {
        conn.execute(CREATE_TABLE, [])?;
        let entries = load(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            bookmarks: Bookmarks::from_entries(entries),
        })
    }
}

fn load(conn: &Connection) -> StateResult<BTreeMap<String, CursorValue>> {
    let mut stmt = conn.prepare("SELECT stream, cursor_json FROM bookmarks")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut entries = BTreeMap::new();
    for row in rows {
        let (stream, cursor_json) = row?;
        entries.insert(stream, serde_json::from_str(&cursor_json)?);
    }
    Ok(entries)
}

impl BookmarkStore for SqliteStateStore {
    fn bookmarks(&self) -> &Bookmarks {
        &self.bookmarks
    }

    fn persist(&self, plan: &FlushPlan) -> StateResult<()> {
        let mut conn = self.conn.lock().unwrap();
        // Take the write lock up front so the read below cannot go stale.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if plan.cleared {
            tx.execute("DELETE FROM bookmarks", [])?;
        }
        for stream in &plan.removed {
            tx.execute("DELETE FROM bookmarks WHERE stream = ?1", [stream])?;
        }

        let persisted = load(&tx)?;
        let merged = plan.merge(persisted.clone());
        let mut written = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO bookmarks (stream, cursor_json, updated_at)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(stream) DO UPDATE SET
                    cursor_json = excluded.cursor_json,
                    updated_at = excluded.updated_at",
            )?;
            for (stream, cursor) in &merged {
                if persisted.get(stream) == Some(cursor) {
                    continue;
                }
                stmt.execute(params![stream, serde_json::to_string(cursor)?])?;
                written += 1;
            }
        }
        tx.commit()?;

        debug!(streams = merged.len(), written, "State flushed");
        Ok(())
    }
}
