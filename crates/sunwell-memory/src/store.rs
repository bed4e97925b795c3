use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::MemoryError;

/// Append-only JSONL-backed store for one record kind. Every record that
/// has ever been written is retained on disk; readers decide what to do
/// with stale or superseded entries. Mirrors the `tandem-memory` database
/// split of "one concern per table", just without the SQL.
pub struct JsonlStore<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T> JsonlStore<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &T) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let line = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }

    /// Replaces the entire file's contents with `records`. Used by
    /// retention policies that prune old entries rather than appending
    /// forever; callers are responsible for reading the current contents
    /// first if they need to preserve anything.
    pub async fn rewrite(&self, records: &[T]) -> Result<(), MemoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut buffer = String::new();
        for record in records {
            buffer.push_str(&serde_json::to_string(record)?);
            buffer.push('\n');
        }
        fs::write(&self.path, buffer).await?;
        Ok(())
    }

    pub async fn load_all(&self) -> Result<Vec<T>, MemoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).await?;
        let mut records = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<T>(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = lineno,
                        error = %err,
                        "skipping malformed memory record"
                    );
                }
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[tokio::test]
    async fn append_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonlStore<Sample> = JsonlStore::new(dir.path().join("sample.jsonl"));
        store.append(&Sample { value: 1 }).await.unwrap();
        store.append(&Sample { value: 2 }).await.unwrap();
        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, vec![Sample { value: 1 }, Sample { value: 2 }]);
    }

    #[tokio::test]
    async fn load_all_on_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonlStore<Sample> = JsonlStore::new(dir.path().join("missing.jsonl"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rewrite_replaces_prior_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonlStore<Sample> = JsonlStore::new(dir.path().join("sample.jsonl"));
        store.append(&Sample { value: 1 }).await.unwrap();
        store.rewrite(&[Sample { value: 9 }]).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), vec![Sample { value: 9 }]);
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.jsonl");
        fs::write(&path, "{\"value\":1}\nnot json\n{\"value\":2}\n")
            .await
            .unwrap();
        let store: JsonlStore<Sample> = JsonlStore::new(path);
        let loaded = store.load_all().await.unwrap();
        assert_eq!(loaded, vec![Sample { value: 1 }, Sample { value: 2 }]);
    }
}
