//! `StagedDispatcher`: a transactional handler that holds batches until the
//! engine commits.
//!
//! `handle_entry_batch` only validates and stages. `commit_transaction`
//! delivers the staged batches in order through the wrapped
//! [`EntryDispatcher`]; `rollback_transaction` throws them away without I/O.
//! A batch that arrives outside an open transaction is delivered immediately.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::dispatcher::EntryDispatcher;
use crate::entry::{StateChangeEntry, SyncEvent};
use crate::error::SinkError;
use crate::handler::EntryHandler;
use crate::params::NetworkParams;

pub struct StagedDispatcher {
    inner: EntryDispatcher,
    staged: Vec<Vec<StateChangeEntry>>,
    open: bool,
}

impl StagedDispatcher {
    pub fn new(inner: EntryDispatcher) -> Self {
        Self {
            inner,
            staged: Vec::new(),
            open: false,
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.open
    }

    /// Batches waiting for commit.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn inner(&self) -> &EntryDispatcher {
        &self.inner
    }
}

#[async_trait]
impl EntryHandler for StagedDispatcher {
    async fn handle_entry_batch(&mut self, batch: &[StateChangeEntry]) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Err(SinkError::EmptyBatch);
        }
        if !self.open {
            return self.inner.dispatch(batch).await;
        }
        self.staged.push(batch.to_vec());
        Ok(())
    }

    async fn initiate_transaction(&mut self) -> Result<(), SinkError> {
        if self.open && !self.staged.is_empty() {
            warn!(dropped = self.staged.len(), "transaction reopened, dropping staged batches");
        }
        self.staged.clear();
        self.open = true;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<(), SinkError> {
        self.open = false;
        let staged = std::mem::take(&mut self.staged);
        debug!(batches = staged.len(), "committing staged batches");
        for batch in &staged {
            self.inner.dispatch(batch).await?;
        }
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> Result<(), SinkError> {
        debug!(batches = self.staged.len(), "rolling back staged batches");
        self.staged.clear();
        self.open = false;
        Ok(())
    }

    async fn handle_sync_event(&mut self, event: SyncEvent) -> Result<(), SinkError> {
        self.inner.handle_sync_event(event).await
    }

    fn params(&self) -> &NetworkParams {
        self.inner.params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DispatcherConfig, TransactionMode};
    use crate::dispatcher::testing::SpyPoster;
    use crate::entry::decode_batch;

    fn staged(status: u16) -> (Box<dyn EntryHandler>, std::sync::Arc<SpyPoster>) {
        let poster = SpyPoster::answering(status);
        let cfg = DispatcherConfig::http("http://sink").with_transaction_mode(TransactionMode::Staged);
        let handler = EntryDispatcher::builder(cfg)
            .poster(poster.clone())
            .build()
            .unwrap()
            .into_handler();
        (handler, poster)
    }

    fn one(height: u64) -> Vec<StateChangeEntry> {
        vec![StateChangeEntry::upsert(height, vec![1])]
    }

    #[tokio::test]
    async fn commit_delivers_in_order() {
        let (mut h, poster) = staged(200);
        h.initiate_transaction().await.unwrap();
        h.handle_entry_batch(&one(10)).await.unwrap();
        h.handle_entry_batch(&one(11)).await.unwrap();
        assert_eq!(poster.call_count(), 0);

        h.commit_transaction().await.unwrap();
        let calls = poster.calls.lock().unwrap();
        let heights: Vec<u64> = calls
            .iter()
            .map(|(_, body)| decode_batch(body).unwrap()[0].block_height)
            .collect();
        assert_eq!(heights, vec![10, 11]);
    }

    #[tokio::test]
    async fn rollback_sends_nothing() {
        let (mut h, poster) = staged(200);
        h.initiate_transaction().await.unwrap();
        h.handle_entry_batch(&one(10)).await.unwrap();
        h.rollback_transaction().await.unwrap();
        h.commit_transaction().await.unwrap();
        assert_eq!(poster.call_count(), 0);
    }

    #[tokio::test]
    async fn commit_surfaces_sink_failure() {
        let (mut h, poster) = staged(500);
        h.initiate_transaction().await.unwrap();
        h.handle_entry_batch(&one(10)).await.unwrap();
        h.handle_entry_batch(&one(11)).await.unwrap();
        let err = h.commit_transaction().await.unwrap_err();
        assert!(matches!(err, SinkError::UnexpectedStatus { status: 500, .. }));
        assert_eq!(poster.call_count(), 1);
    }

    #[tokio::test]
    async fn empty_batch_rejected_when_staging() {
        let (mut h, _poster) = staged(200);
        h.initiate_transaction().await.unwrap();
        assert!(matches!(
            h.handle_entry_batch(&[]).await.unwrap_err(),
            SinkError::EmptyBatch
        ));
    }

    #[tokio::test]
    async fn outside_transaction_delivers_immediately() {
        let (mut h, poster) = staged(200);
        h.handle_entry_batch(&one(10)).await.unwrap();
        assert_eq!(poster.call_count(), 1);
    }
}
