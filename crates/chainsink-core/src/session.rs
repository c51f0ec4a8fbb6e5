//! Lazily-dialed, reusable streaming session.
//!
//! ```text
//! NoSession ──dial ok──▶ Connected ──write failure──▶ Failed
//!     ▲  │                    │                        │
//!     └──┘ dial failure       └── write ok (reuse)     └──dial ok──▶ Connected
//! ```
//!
//! A failed write drops the connection, so the next send dials again instead
//! of reusing a broken socket.

use tracing::{debug, info, warn};

use crate::error::SinkError;
use crate::transport::{MessageStream, StreamConnector};

/// Observable state of a [`TransportSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Never connected.
    NoSession,
    /// Holding a live connection.
    Connected,
    /// The last write failed and the connection was discarded.
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSession => write!(f, "no-session"),
            Self::Connected => write!(f, "connected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

enum Slot {
    Empty,
    Live(Box<dyn MessageStream>),
    Broken,
}

/// A streaming connection owned by exactly one dispatcher.
pub struct TransportSession {
    url: String,
    connector: Box<dyn StreamConnector>,
    slot: Slot,
    dials: u64,
}

impl TransportSession {
    pub fn new(url: impl Into<String>, connector: Box<dyn StreamConnector>) -> Self {
        Self {
            url: url.into(),
            connector,
            slot: Slot::Empty,
            dials: 0,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> SessionState {
        match self.slot {
            Slot::Empty => SessionState::NoSession,
            Slot::Live(_) => SessionState::Connected,
            Slot::Broken => SessionState::Failed,
        }
    }

    /// Number of successful dials over the session's lifetime.
    pub fn dial_count(&self) -> u64 {
        self.dials
    }

    /// Send one text message, dialing first if there is no live connection.
    pub async fn send(&mut self, text: String) -> Result<(), SinkError> {
        let written = match self.slot {
            Slot::Live(ref mut conn) => conn.send_text(text).await,
            _ => {
                let mut conn = self.connector.connect(&self.url).await?;
                self.dials += 1;
                info!(url = %self.url, dials = self.dials, "streaming session established");
                let written = conn.send_text(text).await;
                self.slot = Slot::Live(conn);
                written
            }
        };
        match written {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(url = %self.url, error = %e, "write failed, discarding session");
                if let Slot::Live(mut conn) = std::mem::replace(&mut self.slot, Slot::Broken) {
                    conn.close().await;
                }
                Err(e)
            }
        }
    }

    /// Close the live connection, if any, and return to `NoSession`.
    pub async fn shutdown(&mut self) {
        if let Slot::Live(mut conn) = std::mem::replace(&mut self.slot, Slot::Empty) {
            debug!(url = %self.url, "closing streaming session");
            conn.close().await;
        }
        self.slot = Slot::Empty;
    }
}
