use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::MemoryError;

/// One exchange in a session's conversation with a provider. `parent_turn_id`
/// is `None` for a session's first turn; any later turn can name an earlier
/// one as its parent rather than only the immediately preceding turn, so a
/// specialist branching off its parent's context forms a DAG rather than a
/// flat log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub session_id: String,
    pub parent_turn_id: Option<String>,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Expects the `SELECT id, session_id, parent_turn_id, role, created_at,
/// content` column order used throughout this module.
fn row_to_turn(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationTurn> {
    let created_at: String = row.get(4)?;
    Ok(ConversationTurn {
        id: row.get(0)?,
        session_id: row.get(1)?,
        parent_turn_id: row.get(2)?,
        role: row.get(3)?,
        created_at: created_at.parse().unwrap_or_else(|_| Utc::now()),
        content: row.get(5)?,
    })
}

/// SQLite-backed store for a workspace's conversation turns, forming a DAG
/// per session via `parent_turn_id`. Lives alongside the JSONL intelligence
/// logs as `conversation.db`, independent of them, so it can be inspected or
/// wiped without touching decisions/failures/learnings.
pub struct ConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl ConversationStore {
    pub fn new(db_dir: &Path) -> Result<Self, MemoryError> {
        std::fs::create_dir_all(db_dir)?;
        let conn = Connection::open(db_dir.join("conversation.db"))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS conversation_turns (
                 id             TEXT PRIMARY KEY,
                 session_id     TEXT NOT NULL,
                 parent_turn_id TEXT,
                 role           TEXT NOT NULL,
                 created_at     TEXT NOT NULL,
                 content        TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_turns_session ON conversation_turns(session_id);
             CREATE INDEX IF NOT EXISTS idx_turns_parent ON conversation_turns(parent_turn_id);",
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Records one turn and returns its generated id. `parent_turn_id` is
    /// not validated against the table — a dangling parent (e.g. the parent
    /// session's own store, in a future cross-store design) just means
    /// `ancestors` stops one turn early.
    pub fn record_turn(
        &self,
        session_id: &str,
        parent_turn_id: Option<&str>,
        role: &str,
        content: &str,
    ) -> Result<String, MemoryError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let conn = self.conn.lock().expect("conversation store mutex poisoned");
        conn.execute(
            "INSERT INTO conversation_turns (id, session_id, parent_turn_id, role, created_at, content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, session_id, parent_turn_id, role, now.to_rfc3339(), content],
        )?;
        Ok(id)
    }

    /// Every turn recorded for a session, oldest first.
    pub fn turns_for_session(&self, session_id: &str) -> Result<Vec<ConversationTurn>, MemoryError> {
        let conn = self.conn.lock().expect("conversation store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, session_id, parent_turn_id, role, created_at, content
             FROM conversation_turns WHERE session_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_turn)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(MemoryError::from)
    }

    /// Walks `parent_turn_id` links from `turn_id` back to the session's
    /// first turn, returned root-first.
    pub fn ancestors(&self, turn_id: &str) -> Result<Vec<ConversationTurn>, MemoryError> {
        let conn = self.conn.lock().expect("conversation store mutex poisoned");
        let mut chain = Vec::new();
        let mut current = Some(turn_id.to_string());
        while let Some(id) = current {
            let turn: Option<ConversationTurn> = conn
                .query_row(
                    "SELECT id, session_id, parent_turn_id, role, created_at, content
                     FROM conversation_turns WHERE id = ?1",
                    params![id],
                    row_to_turn,
                )
                .optional()?;
            let Some(turn) = turn else { break };
            current = turn.parent_turn_id.clone();
            chain.push(turn);
        }
        chain.reverse();
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_for_a_session_come_back_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        let first = store.record_turn("s1", None, "user", "implement retries").unwrap();
        store.record_turn("s1", Some(&first), "assistant", "done").unwrap();

        let turns = store.turns_for_session("s1").unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].id, first);
        assert_eq!(turns[1].parent_turn_id.as_deref(), Some(first.as_str()));
    }

    #[test]
    fn ancestors_walks_the_chain_back_to_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        let root = store.record_turn("s1", None, "user", "goal").unwrap();
        let mid = store.record_turn("s1", Some(&root), "assistant", "plan").unwrap();
        let leaf = store.record_turn("s1", Some(&mid), "user", "refine").unwrap();

        let chain = store.ancestors(&leaf).unwrap();
        assert_eq!(chain.iter().map(|t| t.id.clone()).collect::<Vec<_>>(), vec![root, mid, leaf]);
    }

    #[test]
    fn a_session_is_isolated_from_another_sessions_turns() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConversationStore::new(dir.path()).unwrap();

        store.record_turn("s1", None, "user", "goal one").unwrap();
        store.record_turn("s2", None, "user", "goal two").unwrap();

        assert_eq!(store.turns_for_session("s1").unwrap().len(), 1);
        assert_eq!(store.turns_for_session("s2").unwrap().len(), 1);
    }
}
