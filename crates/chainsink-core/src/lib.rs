//! chainsink-core: forwards blockchain state-change batches to external sinks.
//!
//! # Architecture
//!
//! ```text
//! sync engine / ReplayDriver
//!     │ initiate → handle_entry_batch → commit | rollback
//!     ▼
//! EntryHandler ── EntryDispatcher   (immediate: hooks are no-ops)
//!              └─ StagedDispatcher  (staged: deliver on commit)
//!                        │
//!                        ├── watermark filter (MinBlockHeight)
//!                        ├── BatchPoster       (HTTP POST, 200 only)
//!                        └── TransportSession  (lazy WebSocket, redial on failure)
//! ```

pub mod checkpoint;
pub mod config;
pub mod dispatcher;
pub mod entry;
pub mod error;
pub mod handler;
pub mod params;
pub mod replay;
pub mod retry;
pub mod session;
pub mod staged;
pub mod transport;

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use config::{DispatcherConfig, SinkKind, TransactionMode};
pub use dispatcher::{DispatcherBuilder, EntryDispatcher, HTTP_OK};
pub use entry::{
    decode_batch, encode_batch, encode_batch_text, OperationType, StateChangeEntry, SyncEvent,
};
pub use error::{ErrorKind, ReplayError, SinkError};
pub use handler::EntryHandler;
pub use params::{Network, NetworkParams};
pub use replay::{ChangeLog, ReplayConfig, ReplayDriver, ReplaySummary};
pub use retry::{RetryConfig, RetryPolicy};
pub use session::{SessionState, TransportSession};
pub use staged::StagedDispatcher;
pub use transport::{BatchPoster, MessageStream, StreamConnector};
