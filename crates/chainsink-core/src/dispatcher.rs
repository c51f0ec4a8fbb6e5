//! `EntryDispatcher`: forwards entry batches to an HTTP endpoint or a
//! WebSocket stream.
//!
//! Per batch:
//!   1. reject empty batches
//!   2. drop batches below the height watermark (success, no I/O)
//!   3. pick the transport (HTTP if an endpoint is set, else WebSocket)
//!   4. serialize the whole batch as one JSON array and send it
//!
//! Nothing is retried here. The engine rolls back and redelivers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{DispatcherConfig, SinkKind, TransactionMode};
use crate::entry::{encode_batch, encode_batch_text, StateChangeEntry};
use crate::error::SinkError;
use crate::handler::EntryHandler;
use crate::params::NetworkParams;
use crate::session::{SessionState, TransportSession};
use crate::staged::StagedDispatcher;
use crate::transport::{BatchPoster, StreamConnector};

/// The only status code treated as a successful HTTP delivery.
pub const HTTP_OK: u16 = 200;

/// Forwards state-change batches to the configured sink.
pub struct EntryDispatcher {
    config: DispatcherConfig,
    params: NetworkParams,
    poster: Option<Arc<dyn BatchPoster>>,
    session: Option<TransportSession>,
}

impl EntryDispatcher {
    pub fn builder(config: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            params: NetworkParams::default(),
            poster: None,
            connector: None,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Streaming session state, or `None` when no connector was supplied.
    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(TransportSession::state)
    }

    /// Wrap this dispatcher according to the configured transaction mode.
    pub fn into_handler(self) -> Box<dyn EntryHandler> {
        match self.config.transaction_mode {
            TransactionMode::Immediate => Box::new(self),
            TransactionMode::Staged => Box::new(StagedDispatcher::new(self)),
        }
    }

    /// Validate, filter and send one batch.
    pub async fn dispatch(&mut self, batch: &[StateChangeEntry]) -> Result<(), SinkError> {
        let first = batch.first().ok_or(SinkError::EmptyBatch)?;

        if first.block_height < self.config.min_block_height {
            debug!(
                height = first.block_height,
                min = self.config.min_block_height,
                entries = batch.len(),
                "below minimum block height, skipping batch"
            );
            return Ok(());
        }

        match self.config.sink_kind() {
            Some(SinkKind::Http) => self.push_to_endpoint(batch).await,
            Some(SinkKind::WebSocket) => self.send_over_stream(batch).await,
            None => Err(SinkError::NoSinkConfigured),
        }
    }

    async fn push_to_endpoint(&mut self, batch: &[StateChangeEntry]) -> Result<(), SinkError> {
        let url = &self.config.endpoint_url;
        let poster = self
            .poster
            .as_ref()
            .ok_or(SinkError::MissingTransport { transport: "http" })?;

        let body = encode_batch(batch).map_err(|source| SinkError::Serialization {
            target: url.clone(),
            source,
        })?;
        let bytes = body.len();

        let status = poster.post_json(url, body).await?;
        if status != HTTP_OK {
            return Err(SinkError::UnexpectedStatus {
                target: url.clone(),
                status,
            });
        }

        info!(
            url = %url,
            entries = batch.len(),
            first_height = batch[0].block_height,
            bytes,
            "batch delivered over HTTP"
        );
        Ok(())
    }

    async fn send_over_stream(&mut self, batch: &[StateChangeEntry]) -> Result<(), SinkError> {
        let session = self
            .session
            .as_mut()
            .ok_or(SinkError::MissingTransport { transport: "websocket" })?;

        let text = encode_batch_text(batch).map_err(|source| SinkError::Serialization {
            target: session.url().to_string(),
            source,
        })?;
        let bytes = text.len();

        session.send(text).await?;

        info!(
            url = %session.url(),
            entries = batch.len(),
            first_height = batch[0].block_height,
            bytes,
            "batch delivered over WebSocket"
        );
        Ok(())
    }
}

#[async_trait]
impl EntryHandler for EntryDispatcher {
    async fn handle_entry_batch(&mut self, batch: &[StateChangeEntry]) -> Result<(), SinkError> {
        self.dispatch(batch).await
    }

    fn params(&self) -> &NetworkParams {
        &self.params
    }
}

/// Builder for [`EntryDispatcher`].
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    params: NetworkParams,
    poster: Option<Arc<dyn BatchPoster>>,
    connector: Option<Box<dyn StreamConnector>>,
}

impl DispatcherBuilder {
    pub fn params(mut self, params: NetworkParams) -> Self {
        self.params = params;
        self
    }

    /// Request/response transport used when an endpoint URL is configured.
    pub fn poster(mut self, poster: Arc<dyn BatchPoster>) -> Self {
        self.poster = Some(poster);
        self
    }

    /// Streaming transport used when WebSocket mode is enabled.
    pub fn connector(mut self, connector: Box<dyn StreamConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Fails if the config selects a transport that was not supplied.
    pub fn build(self) -> Result<EntryDispatcher, SinkError> {
        match self.config.sink_kind() {
            Some(SinkKind::Http) if self.poster.is_none() => {
                return Err(SinkError::MissingTransport { transport: "http" });
            }
            Some(SinkKind::WebSocket) if self.connector.is_none() => {
                return Err(SinkError::MissingTransport { transport: "websocket" });
            }
            _ => {}
        }

        let ws_url = self.config.ws_url.clone();
        Ok(EntryDispatcher {
            session: self
                .connector
                .map(|connector| TransportSession::new(ws_url, connector)),
            config: self.config,
            params: self.params,
            poster: self.poster,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    /// Records every POST and answers with a fixed status.
    pub struct SpyPoster {
        pub status: u16,
        pub calls: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    }

    impl SpyPoster {
        pub fn answering(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                calls: Arc::default(),
            })
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl BatchPoster for SpyPoster {
        async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, SinkError> {
            self.calls.lock().unwrap().push((url.to_string(), body));
            Ok(self.status)
        }
    }
}
