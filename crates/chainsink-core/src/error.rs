//! Error types for the dispatch path and the replay driver.

use thiserror::Error;

/// Coarse classification of a [`SinkError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller handed us something unusable, or nothing is configured.
    Validation,
    /// Dial, write, status or serialization failure on the way to a sink.
    Transport,
}

/// Errors returned by an `EntryHandler`.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no entries to send: batch is empty")]
    EmptyBatch,

    #[error("no sink configured: set an endpoint URL or enable WebSocket streaming")]
    NoSinkConfigured,

    #[error("{transport} transport selected but no implementation was supplied")]
    MissingTransport { transport: &'static str },

    /// The transport itself could not be constructed from its settings.
    #[error("failed to build {transport} client: {reason}")]
    ClientBuild { transport: &'static str, reason: String },

    #[error("failed to serialize batch for {target}: {source}")]
    Serialization {
        target: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("failed to send to {target}: {reason}")]
    Send { target: String, reason: String },

    #[error("unexpected HTTP status code {status} from {target}")]
    UnexpectedStatus { target: String, status: u16 },
}

impl SinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyBatch
            | Self::NoSinkConfigured
            | Self::MissingTransport { .. }
            | Self::ClientBuild { .. } => ErrorKind::Validation,
            Self::Serialization { .. }
            | Self::Connect { .. }
            | Self::Send { .. }
            | Self::UnexpectedStatus { .. } => ErrorKind::Transport,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// The URL the failed operation was aimed at, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Serialization { target, .. }
            | Self::Connect { target, .. }
            | Self::Send { target, .. }
            | Self::UnexpectedStatus { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// Errors raised by the replay driver.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("batch at entry {entry_index} failed after {attempts} attempts: {source}")]
    Handler {
        entry_index: u64,
        attempts: u32,
        #[source]
        source: SinkError,
    },

    #[error("checkpoint error: {0}")]
    Checkpoint(String),

    #[error("change log {path}: {reason}")]
    ChangeLog { path: String, reason: String },
}
