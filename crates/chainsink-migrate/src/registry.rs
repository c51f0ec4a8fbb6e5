//! Changesets shipped with the binary.

use crate::changeset::{Changeset, MigrationSet};
use crate::error::MigrateError;

/// Gate for the explorer statistics schema.
pub const EXPLORER_STATISTICS: &str = "explorer_statistics";

/// Schema applied after the initial sync has caught up.
pub fn post_sync() -> Result<MigrationSet, MigrateError> {
    let mut set = MigrationSet::new();

    set.register(
        Changeset::new(20230713000002, "create_public_key_first_transaction")
            .gated_by(EXPLORER_STATISTICS)
            .up(
                "CREATE TABLE IF NOT EXISTS public_key_first_transaction (
                    public_key VARCHAR PRIMARY KEY,
                    timestamp  TIMESTAMP,
                    height     BIGINT
                )",
            )
            .up(
                "CREATE INDEX IF NOT EXISTS idx_public_key_first_transaction_timestamp
                 ON public_key_first_transaction (timestamp DESC)",
            )
            .up(
                "CREATE INDEX IF NOT EXISTS idx_public_key_first_transaction_height
                 ON public_key_first_transaction (height DESC)",
            )
            .down("DROP TABLE IF EXISTS public_key_first_transaction"),
    )?;

    set.register(
        Changeset::new(20230713000003, "create_statistic_block_height_current")
            .gated_by(EXPLORER_STATISTICS)
            .up(
                "CREATE TABLE IF NOT EXISTS statistic_block_height_current (
                    id         INTEGER PRIMARY KEY DEFAULT 1,
                    height     BIGINT NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )",
            )
            .down("DROP TABLE IF EXISTS statistic_block_height_current"),
    )?;

    Ok(set)
}
