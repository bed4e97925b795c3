//! Response cache — avoid burning tokens on repeated prompts.
//!
//! Stores provider responses in a dedicated SQLite table keyed by a SHA-256
//! hash of `(model, system_prompt, user_prompt)`. Entries expire after a
//! configurable TTL. Lives alongside `conversation.db` as `response_cache.db`
//! so either can be wiped independently.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use crate::MemoryError;

pub struct ResponseCache {
    conn: Arc<Mutex<Connection>>,
    ttl_minutes: i64,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(db_dir: &Path, ttl_minutes: u32, max_entries: usize) -> Result<Self, MemoryError> {
        std::fs::create_dir_all(db_dir)?;
        let conn = Connection::open(db_dir.join("response_cache.db"))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             CREATE TABLE IF NOT EXISTS response_cache (
                 prompt_hash TEXT PRIMARY KEY,
                 model       TEXT NOT NULL,
                 response    TEXT NOT NULL,
                 token_count INTEGER NOT NULL DEFAULT 0,
                 created_at  TEXT NOT NULL,
                 accessed_at TEXT NOT NULL,
                 hit_count   INTEGER NOT NULL DEFAULT 0
             );
             CREATE INDEX IF NOT EXISTS idx_rc_accessed ON response_cache(accessed_at);
             CREATE INDEX IF NOT EXISTS idx_rc_created ON response_cache(created_at);",
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)), ttl_minutes: i64::from(ttl_minutes), max_entries })
    }

    /// Deterministic cache key from model + system prompt + user prompt.
    pub fn cache_key(model: &str, system_prompt: Option<&str>, user_prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model.as_bytes());
        hasher.update(b"|");
        if let Some(sys) = system_prompt {
            hasher.update(sys.as_bytes());
        }
        hasher.update(b"|");
        hasher.update(user_prompt.as_bytes());
        format!("{:064x}", hasher.finalize())
    }

    /// Returns `None` on a miss or an expired entry; a hit bumps
    /// `accessed_at`/`hit_count` for LRU eviction in `put`.
    pub fn get(&self, key: &str) -> Result<Option<String>, MemoryError> {
        let conn = self.conn.lock().expect("response cache mutex poisoned");
        let cutoff = (Utc::now() - Duration::minutes(self.ttl_minutes)).to_rfc3339();

        let result: Option<String> = conn
            .query_row(
                "SELECT response FROM response_cache WHERE prompt_hash = ?1 AND created_at > ?2",
                params![key, cutoff],
                |row| row.get(0),
            )
            .ok();

        if result.is_some() {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "UPDATE response_cache SET accessed_at = ?1, hit_count = hit_count + 1 WHERE prompt_hash = ?2",
                params![now, key],
            )?;
        }
        Ok(result)
    }

    /// Stores a response, then evicts expired entries and anything past
    /// `max_entries` under LRU.
    pub fn put(&self, key: &str, model: &str, response: &str, token_count: u32) -> Result<(), MemoryError> {
        let conn = self.conn.lock().expect("response cache mutex poisoned");
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT OR REPLACE INTO response_cache
             (prompt_hash, model, response, token_count, created_at, accessed_at, hit_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![key, model, response, token_count, now, now],
        )?;

        let cutoff = (Utc::now() - Duration::minutes(self.ttl_minutes)).to_rfc3339();
        conn.execute("DELETE FROM response_cache WHERE created_at <= ?1", params![cutoff])?;

        let max = self.max_entries as i64;
        conn.execute(
            "DELETE FROM response_cache WHERE prompt_hash IN (
                SELECT prompt_hash FROM response_cache
                ORDER BY accessed_at ASC
                LIMIT MAX(0, (SELECT COUNT(*) FROM response_cache) - ?1)
            )",
            params![max],
        )?;
        Ok(())
    }

    /// `(total_entries, total_hits, estimated_tokens_saved)`.
    pub fn stats(&self) -> Result<(usize, u64, u64), MemoryError> {
        let conn = self.conn.lock().expect("response cache mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM response_cache", [], |row| row.get(0))?;
        let hits: i64 =
            conn.query_row("SELECT COALESCE(SUM(hit_count), 0) FROM response_cache", [], |row| row.get(0))?;
        let tokens_saved: i64 = conn.query_row(
            "SELECT COALESCE(SUM(token_count * hit_count), 0) FROM response_cache",
            [],
            |row| row.get(0),
        )?;
        Ok((count as usize, hits as u64, tokens_saved as u64))
    }

    pub fn clear(&self) -> Result<usize, MemoryError> {
        let conn = self.conn.lock().expect("response cache mutex poisoned");
        Ok(conn.execute("DELETE FROM response_cache", [])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_cached_response_is_returned_on_the_next_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), 60, 100).unwrap();
        let key = ResponseCache::cache_key("mock", Some("be terse"), "implement retries");

        assert!(cache.get(&key).unwrap().is_none());
        cache.put(&key, "mock", "fn retry() {}", 12).unwrap();
        assert_eq!(cache.get(&key).unwrap().as_deref(), Some("fn retry() {}"));
    }

    #[test]
    fn an_expired_entry_is_not_returned() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), 0, 100).unwrap();
        let key = ResponseCache::cache_key("mock", None, "prompt");
        cache.put(&key, "mock", "response", 5).unwrap();

        assert!(cache.get(&key).unwrap().is_none());
    }

    #[test]
    fn cache_key_is_sensitive_to_every_input() {
        let a = ResponseCache::cache_key("mock", Some("sys"), "prompt");
        let b = ResponseCache::cache_key("mock", Some("other-sys"), "prompt");
        let c = ResponseCache::cache_key("other-model", Some("sys"), "prompt");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn stats_reflect_hits_and_token_savings() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), 60, 100).unwrap();
        let key = ResponseCache::cache_key("mock", None, "prompt");
        cache.put(&key, "mock", "response", 10).unwrap();
        cache.get(&key).unwrap();
        cache.get(&key).unwrap();

        let (count, hits, tokens_saved) = cache.stats().unwrap();
        assert_eq!(count, 1);
        assert_eq!(hits, 2);
        assert_eq!(tokens_saved, 20);
    }
}
