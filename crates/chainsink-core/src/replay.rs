//! Replay driver: feeds a JSON-lines change log through an `EntryHandler`
//! the way the upstream sync engine does.
//!
//! # Contract upheld for the handler
//! - batches in file order, never overlapping, one at a time
//! - `initiate` → `handle` → `commit` on success, `rollback` on failure
//! - the checkpoint advances only after a successful commit
//!
//! Failed batches are retried per [`RetryPolicy`]. When retries run out the
//! error is returned and the checkpoint stays where it was, so the next run
//! redelivers the same batch.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::entry::{StateChangeEntry, SyncEvent};
use crate::error::{ReplayError, SinkError};
use crate::handler::EntryHandler;
use crate::retry::{RetryConfig, RetryPolicy};

/// File name of the change log inside the state-change directory.
pub const CHANGE_LOG_FILE: &str = "state_changes.jsonl";

// ─── ChangeLog ────────────────────────────────────────────────────────────────

/// An append-only change log: one JSON-encoded `StateChangeEntry` per line.
pub struct ChangeLog {
    path: PathBuf,
    entries: Vec<StateChangeEntry>,
}

impl ChangeLog {
    /// Read every entry from `path`. Blank lines are skipped.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ReplayError::ChangeLog {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let mut entries = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(line).map_err(|e| ReplayError::ChangeLog {
                path: path.display().to_string(),
                reason: format!("line {}: {e}", lineno + 1),
            })?;
            entries.push(entry);
        }
        Ok(Self { path, entries })
    }

    /// Open `<dir>/state_changes.jsonl`.
    pub async fn open_dir(dir: impl AsRef<Path>) -> Result<Self, ReplayError> {
        Self::open(dir.as_ref().join(CHANGE_LOG_FILE)).await
    }

    pub fn from_entries(entries: Vec<StateChangeEntry>) -> Self {
        Self {
            path: PathBuf::new(),
            entries,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[StateChangeEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split `entries` into consecutive batches of at most `max_bytes` of
/// serialized JSON. A batch always holds at least one entry, even if that
/// entry alone is larger than the limit.
pub fn batch_by_bytes(
    entries: &[StateChangeEntry],
    max_bytes: u64,
) -> Result<Vec<&[StateChangeEntry]>, serde_json::Error> {
    let mut batches = Vec::new();
    let mut start = 0;
    let mut size = 0u64;

    for (i, entry) in entries.iter().enumerate() {
        let len = entry.encoded_len()? as u64;
        if i > start && size + len > max_bytes {
            batches.push(&entries[start..i]);
            start = i;
            size = 0;
        }
        size += len;
    }
    if start < entries.len() {
        batches.push(&entries[start..]);
    }
    Ok(batches)
}

// ─── ReplayDriver ─────────────────────────────────────────────────────────────

/// Driver settings.
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Checkpoint key.
    pub consumer_id: String,
    /// Serialized-size budget per batch.
    pub max_batch_bytes: u64,
    pub retry: RetryConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            consumer_id: "chainsink".into(),
            max_batch_bytes: 5_000_000,
            retry: RetryConfig::default(),
        }
    }
}

/// What a replay run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Entries skipped because an earlier run already committed them.
    pub resumed_from: u64,
    pub batches: u64,
    pub entries: u64,
    /// Failed attempts that were rolled back and retried.
    pub retries: u64,
}

pub struct ReplayDriver {
    config: ReplayConfig,
    retry: RetryPolicy,
    checkpoints: Box<dyn CheckpointStore>,
}

impl ReplayDriver {
    pub fn new(config: ReplayConfig, checkpoints: Box<dyn CheckpointStore>) -> Self {
        Self {
            retry: RetryPolicy::new(config.retry.clone()),
            config,
            checkpoints,
        }
    }

    /// Deliver every uncommitted entry of `log` to `handler`.
    pub async fn run(
        &self,
        log: &ChangeLog,
        handler: &mut dyn EntryHandler,
    ) -> Result<ReplaySummary, ReplayError> {
        let mut committed = match self.checkpoints.load(&self.config.consumer_id).await? {
            Some(cp) => {
                info!(
                    consumer = %cp.consumer_id,
                    entry_index = cp.entry_index,
                    height = cp.block_height,
                    "resuming from checkpoint"
                );
                cp.entry_index
            }
            None => 0,
        };

        let mut summary = ReplaySummary {
            resumed_from: committed,
            ..Default::default()
        };

        let start = usize::try_from(committed).unwrap_or(usize::MAX).min(log.len());
        let pending = &log.entries()[start..];
        let batches = batch_by_bytes(pending, self.config.max_batch_bytes)
            .map_err(|e| ReplayError::ChangeLog {
                path: log.path().display().to_string(),
                reason: e.to_string(),
            })?;

        info!(
            pending = pending.len(),
            batches = batches.len(),
            max_batch_bytes = self.config.max_batch_bytes,
            "starting replay"
        );

        self.notify(handler, SyncEvent::Start).await?;

        for batch in batches {
            summary.retries += self.deliver(handler, batch, committed).await? as u64;

            committed += batch.len() as u64;
            let last_height = batch[batch.len() - 1].block_height;
            self.checkpoints
                .save(Checkpoint::new(&self.config.consumer_id, committed, last_height))
                .await?;

            summary.batches += 1;
            summary.entries += batch.len() as u64;
        }

        self.notify(handler, SyncEvent::Complete).await?;

        info!(
            batches = summary.batches,
            entries = summary.entries,
            retries = summary.retries,
            "replay complete"
        );
        Ok(summary)
    }

    /// One batch through the transactional hooks, retried until it commits or
    /// the policy gives up. Returns the number of retries used.
    async fn deliver(
        &self,
        handler: &mut dyn EntryHandler,
        batch: &[StateChangeEntry],
        entry_index: u64,
    ) -> Result<u32, ReplayError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match Self::attempt(handler, batch).await {
                Ok(()) => return Ok(attempt - 1),
                Err(e) => {
                    if let Err(rb) = handler.rollback_transaction().await {
                        warn!(error = %rb, "rollback failed");
                    }
                    match self.retry.next_delay(attempt) {
                        Some(delay) => {
                            warn!(
                                attempt,
                                entry_index,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "batch failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => {
                            return Err(ReplayError::Handler {
                                entry_index,
                                attempts: attempt,
                                source: e,
                            });
                        }
                    }
                }
            }
        }
    }

    async fn attempt(
        handler: &mut dyn EntryHandler,
        batch: &[StateChangeEntry],
    ) -> Result<(), SinkError> {
        handler.initiate_transaction().await?;
        handler.handle_entry_batch(batch).await?;
        handler.commit_transaction().await
    }

    async fn notify(&self, handler: &mut dyn EntryHandler, event: SyncEvent) -> Result<(), ReplayError> {
        handler
            .handle_sync_event(event)
            .await
            .map_err(|source| ReplayError::Handler {
                entry_index: 0,
                attempts: 1,
                source,
            })
    }
}
