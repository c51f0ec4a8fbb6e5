//! Dispatcher configuration.

use serde::{Deserialize, Serialize};

/// How the transactional hooks behave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionMode {
    /// Deliver inside `handle_entry_batch`; hooks are no-ops.
    #[default]
    Immediate,
    /// Stage batches and deliver them on `commit_transaction`.
    Staged,
}

impl std::str::FromStr for TransactionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "staged" => Ok(Self::Staged),
            other => Err(format!("unknown transaction mode '{other}' (expected immediate|staged)")),
        }
    }
}

impl std::fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::Staged => write!(f, "staged"),
        }
    }
}

/// Which transport a batch goes out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Http,
    WebSocket,
}

/// Construction-time settings for an `EntryDispatcher`. Immutable once built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// HTTP endpoint batches are POSTed to. Empty disables HTTP.
    #[serde(default)]
    pub endpoint_url: String,
    /// Stream batches over a persistent WebSocket.
    #[serde(default)]
    pub use_websocket: bool,
    /// WebSocket URL (`ws://` or `wss://`).
    #[serde(default)]
    pub ws_url: String,
    /// Batches whose first entry is below this height are dropped unsent.
    #[serde(default)]
    pub min_block_height: u64,
    #[serde(default)]
    pub transaction_mode: TransactionMode,
}

impl DispatcherConfig {
    /// HTTP-only configuration.
    pub fn http(endpoint_url: impl Into<String>) -> Self {
        Self {
            endpoint_url: endpoint_url.into(),
            ..Default::default()
        }
    }

    /// WebSocket-only configuration.
    pub fn websocket(ws_url: impl Into<String>) -> Self {
        Self {
            use_websocket: true,
            ws_url: ws_url.into(),
            ..Default::default()
        }
    }

    pub fn with_min_block_height(mut self, height: u64) -> Self {
        self.min_block_height = height;
        self
    }

    pub fn with_transaction_mode(mut self, mode: TransactionMode) -> Self {
        self.transaction_mode = mode;
        self
    }

    /// The transport a batch will use. HTTP wins when both are configured.
    pub fn sink_kind(&self) -> Option<SinkKind> {
        if !self.endpoint_url.is_empty() {
            Some(SinkKind::Http)
        } else if self.use_websocket {
            Some(SinkKind::WebSocket)
        } else {
            None
        }
    }
}
