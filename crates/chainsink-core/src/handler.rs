//! The handler contract the sync engine drives.

use async_trait::async_trait;

use crate::entry::{StateChangeEntry, SyncEvent};
use crate::error::SinkError;
use crate::params::NetworkParams;

/// Trait the sync engine calls for every batch it reads from the change log.
///
/// The engine guarantees batches arrive in order, never overlap, and that at
/// most one call is in flight per handler. Every hook takes `&mut self`, so a
/// handler cannot be driven from two tasks at once without external locking.
///
/// The transactional hooks default to no-ops. Handlers that deliver inside
/// `handle_entry_batch` keep the defaults; handlers with a real transaction
/// (see `StagedDispatcher`) override them.
#[async_trait]
pub trait EntryHandler: Send {
    /// Deliver one non-empty, ordered batch.
    async fn handle_entry_batch(&mut self, batch: &[StateChangeEntry]) -> Result<(), SinkError>;

    /// Called before `handle_entry_batch`.
    async fn initiate_transaction(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Called after a successful `handle_entry_batch`.
    async fn commit_transaction(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Called after a failed `handle_entry_batch`.
    async fn rollback_transaction(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Engine lifecycle notification.
    async fn handle_sync_event(&mut self, _event: SyncEvent) -> Result<(), SinkError> {
        Ok(())
    }

    /// Network parameters the engine decodes entries with.
    fn params(&self) -> &NetworkParams;
}
