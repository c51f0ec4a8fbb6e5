//! chainsink-ws: `tokio-tungstenite` implementation of the streaming transport.
//!
//! [`WsConnector`] dials; the returned stream writes one text frame per batch.
//! Reconnect policy is not handled here: `TransportSession` drops a stream
//! after a failed write and asks the connector for a new one on the next send.

use async_trait::async_trait;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use chainsink_core::error::SinkError;
use chainsink_core::transport::{MessageStream, StreamConnector};

/// Dials `ws://` / `wss://` URLs.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn MessageStream>, SinkError> {
        debug!(url, "dialing WebSocket");
        let (inner, resp) = connect_async(url).await.map_err(|e| SinkError::Connect {
            target: url.to_string(),
            reason: e.to_string(),
        })?;
        info!(url, status = resp.status().as_u16(), "WebSocket connected");
        Ok(Box::new(WsStream {
            url: url.to_string(),
            inner,
        }))
    }
}

/// A connected WebSocket.
pub struct WsStream {
    url: String,
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl MessageStream for WsStream {
    async fn send_text(&mut self, text: String) -> Result<(), SinkError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| SinkError::Send {
                target: self.url.clone(),
                reason: e.to_string(),
            })
    }

    async fn close(&mut self) {
        if let Err(e) = self.inner.close(None).await {
            debug!(url = %self.url, error = %e, "WebSocket close failed");
        }
    }
}
