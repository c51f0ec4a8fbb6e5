//! Consumer progress checkpoints.
//!
//! A checkpoint records how many change-log entries have been committed by a
//! consumer. The replay driver only writes one after a successful commit, so a
//! crash before that point redelivers the same batch on restart.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ReplayError;

/// A persisted checkpoint for a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique consumer identifier.
    pub consumer_id: String,
    /// Number of change-log entries committed so far.
    pub entry_index: u64,
    /// Block height of the last committed entry.
    pub block_height: u64,
    /// Unix timestamp of when this checkpoint was saved.
    pub updated_at: i64,
}

impl Checkpoint {
    pub fn new(consumer_id: impl Into<String>, entry_index: u64, block_height: u64) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            entry_index,
            block_height,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Trait for storing and loading checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, consumer_id: &str) -> Result<Option<Checkpoint>, ReplayError>;

    /// Save (upsert) a checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), ReplayError>;

    /// Delete a checkpoint (e.g. when resetting a consumer).
    async fn delete(&self, consumer_id: &str) -> Result<(), ReplayError>;
}

// ─── In-memory store ──────────────────────────────────────────────────────────

/// In-memory checkpoint store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Checkpoint>>, ReplayError> {
        self.data
            .lock()
            .map_err(|_| ReplayError::Checkpoint("checkpoint store lock poisoned".into()))
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, consumer_id: &str) -> Result<Option<Checkpoint>, ReplayError> {
        Ok(self.lock()?.get(consumer_id).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), ReplayError> {
        self.lock()?.insert(checkpoint.consumer_id.clone(), checkpoint);
        Ok(())
    }

    async fn delete(&self, consumer_id: &str) -> Result<(), ReplayError> {
        self.lock()?.remove(consumer_id);
        Ok(())
    }
}

// ─── File store ───────────────────────────────────────────────────────────────

/// One JSON file per consumer under a progress directory.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-write leaves the previous checkpoint intact.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Use `dir` for checkpoint files, creating it if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ReplayError::Checkpoint(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Hex keeps distinct ids on distinct files whatever characters they use.
    fn path_for(&self, consumer_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.checkpoint.json", hex::encode(consumer_id.as_bytes())))
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, consumer_id: &str) -> Result<Option<Checkpoint>, ReplayError> {
        let path = self.path_for(consumer_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ReplayError::Checkpoint(format!("read {}: {e}", path.display())))
            }
        };
        let cp: Checkpoint = serde_json::from_slice(&raw)
            .map_err(|e| ReplayError::Checkpoint(format!("decode {}: {e}", path.display())))?;
        if cp.consumer_id != consumer_id {
            warn!(
                requested = consumer_id,
                stored = %cp.consumer_id,
                path = %path.display(),
                "checkpoint belongs to another consumer, ignoring"
            );
            return Ok(None);
        }
        Ok(Some(cp))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), ReplayError> {
        let path = self.path_for(&checkpoint.consumer_id);
        let tmp = path.with_extension("json.tmp");
        let raw = serde_json::to_vec_pretty(&checkpoint)
            .map_err(|e| ReplayError::Checkpoint(e.to_string()))?;

        tokio::fs::write(&tmp, raw)
            .await
            .map_err(|e| ReplayError::Checkpoint(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| ReplayError::Checkpoint(format!("rename {}: {e}", path.display())))?;

        debug!(
            consumer = %checkpoint.consumer_id,
            entry_index = checkpoint.entry_index,
            height = checkpoint.block_height,
            "checkpoint saved"
        );
        Ok(())
    }

    async fn delete(&self, consumer_id: &str) -> Result<(), ReplayError> {
        let path = self.path_for(consumer_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReplayError::Checkpoint(format!("remove {}: {e}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryCheckpointStore::new();
        assert!(store.load("sink").await.unwrap().is_none());

        store.save(Checkpoint::new("sink", 42, 100_000)).await.unwrap();
        let cp = store.load("sink").await.unwrap().unwrap();
        assert_eq!(cp.entry_index, 42);
        assert_eq!(cp.block_height, 100_000);

        store.delete("sink").await.unwrap();
        assert!(store.load("sink").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileCheckpointStore::open(dir.path()).await.unwrap();
            store.save(Checkpoint::new("web/sink", 7, 12)).await.unwrap();
        }
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        let cp = store.load("web/sink").await.unwrap().unwrap();
        assert_eq!(cp.entry_index, 7);
        assert_eq!(cp.consumer_id, "web/sink");

        store.delete("web/sink").await.unwrap();
        store.delete("web/sink").await.unwrap();
        assert!(store.load("web/sink").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_keeps_similar_ids_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();

        store.save(Checkpoint::new("web/sink", 500, 9)).await.unwrap();
        assert!(store.load("web_sink").await.unwrap().is_none());

        store.save(Checkpoint::new("web_sink", 3, 1)).await.unwrap();
        assert_eq!(store.load("web/sink").await.unwrap().unwrap().entry_index, 500);
        assert_eq!(store.load("web_sink").await.unwrap().unwrap().entry_index, 3);
    }

    #[tokio::test]
    async fn file_store_ignores_checkpoint_of_another_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();

        // a file whose name says "alpha" but whose content says "beta"
        let foreign = serde_json::to_vec(&Checkpoint::new("beta", 42, 7)).unwrap();
        tokio::fs::write(store.path_for("alpha"), foreign).await.unwrap();

        assert!(store.load("alpha").await.unwrap().is_none());
    }
}
