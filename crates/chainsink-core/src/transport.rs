//! Transport abstractions: one for request/response sinks, two for streams.
//!
//! Concrete implementations live in `chainsink-http` (`reqwest`) and
//! `chainsink-ws` (`tokio-tungstenite`); tests plug in spies.

use async_trait::async_trait;

use crate::error::SinkError;

/// One-shot request/response transport.
#[async_trait]
pub trait BatchPoster: Send + Sync {
    /// POST `body` as `application/json` to `url` and return the status code.
    ///
    /// Implementations must read the response body to the end (or drop it)
    /// before returning, whatever the status, so the connection is released.
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, SinkError>;
}

/// An established streaming connection.
#[async_trait]
pub trait MessageStream: Send {
    /// Write one text message.
    async fn send_text(&mut self, text: String) -> Result<(), SinkError>;

    /// Best-effort close. Errors are ignored by callers.
    async fn close(&mut self) {}
}

/// Dials new streaming connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn MessageStream>, SinkError>;
}
