//! chainsink-migrate: versioned up/down changesets with bounded retry.
//!
//! Statements that fail with a transient class (lock timeout, deadlock,
//! serialization conflict, statement timeout, lost connection) are retried
//! with capped exponential backoff. Permanent failures stop the run at once.
//! A changeset gated by a feature flag is skipped in both directions while
//! the flag is off, and is not recorded as applied.

pub mod changeset;
pub mod error;
pub mod memory;
pub mod migrator;
pub mod registry;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use changeset::{Changeset, FeatureFlags, MigrationSet};
pub use error::{classify_sqlstate, ErrorClass, MigrateError, StatementError};
pub use memory::{MemoryExecutor, MemoryVersionStore};
pub use migrator::{default_retry, MigrateReport, Migrator, StatementExecutor, VersionStore};
pub use registry::{post_sync, EXPLORER_STATISTICS};

#[cfg(feature = "postgres")]
pub use postgres::{connect_options, PgExecutor};
