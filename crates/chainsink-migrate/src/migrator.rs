//! Applies and reverts changesets with bounded retry on transient failures.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use chainsink_core::retry::{RetryConfig, RetryPolicy};

use crate::changeset::{Changeset, FeatureFlags, MigrationSet};
use crate::error::{ErrorClass, MigrateError, StatementError};

/// Runs one SQL statement (or a multi-statement script).
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<(), StatementError>;
}

/// Tracks which changeset versions have been applied.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Applied versions in ascending order.
    async fn applied(&self) -> Result<Vec<i64>, MigrateError>;
    async fn record(&self, version: i64, name: &str) -> Result<(), MigrateError>;
    async fn remove(&self, version: i64) -> Result<(), MigrateError>;
}

/// Default migrator backoff: 5 retries, 1 s doubling to a 30 s cap.
pub fn default_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 5,
        initial_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(30),
        multiplier: 2.0,
    }
}

/// What a single `up`/`down` run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrateReport {
    /// Versions executed, in execution order.
    pub executed: Vec<i64>,
    /// Versions passed over because their gate is off.
    pub gated: Vec<i64>,
    /// Transient failures that were retried.
    pub retries: u32,
}

pub struct Migrator {
    set: MigrationSet,
    flags: FeatureFlags,
    retry: RetryPolicy,
}

impl Migrator {
    pub fn new(set: MigrationSet, flags: FeatureFlags) -> Self {
        Self {
            set,
            flags,
            retry: RetryPolicy::new(default_retry()),
        }
    }

    pub fn with_retry(mut self, config: RetryConfig) -> Self {
        self.retry = RetryPolicy::new(config);
        self
    }

    pub fn set(&self) -> &MigrationSet {
        &self.set
    }

    /// Apply every enabled changeset that is not yet recorded, in version order.
    pub async fn up(
        &self,
        exec: &dyn StatementExecutor,
        store: &dyn VersionStore,
    ) -> Result<MigrateReport, MigrateError> {
        let applied = store.applied().await?;
        let mut report = MigrateReport::default();

        for cs in self.set.iter() {
            if applied.contains(&cs.version) {
                debug!(version = cs.version, name = %cs.name, "already applied");
                continue;
            }
            if !cs.is_enabled(&self.flags) {
                info!(version = cs.version, name = %cs.name, gate = ?cs.gate, "gate off, skipping");
                report.gated.push(cs.version);
                continue;
            }

            info!(version = cs.version, name = %cs.name, "applying changeset");
            report.retries += self.run_statements(exec, cs, &cs.up).await?;
            store.record(cs.version, &cs.name).await?;
            report.executed.push(cs.version);
        }

        info!(
            executed = report.executed.len(),
            gated = report.gated.len(),
            retries = report.retries,
            "migrations up to date"
        );
        Ok(report)
    }

    /// Revert the `steps` most recently applied enabled changesets, newest first.
    pub async fn down(
        &self,
        steps: usize,
        exec: &dyn StatementExecutor,
        store: &dyn VersionStore,
    ) -> Result<MigrateReport, MigrateError> {
        let mut applied = store.applied().await?;
        applied.sort_unstable();
        let mut report = MigrateReport::default();

        for version in applied.into_iter().rev() {
            if report.executed.len() >= steps {
                break;
            }
            let cs = self
                .set
                .get(version)
                .ok_or(MigrateError::UnknownVersion(version))?;
            if !cs.is_enabled(&self.flags) {
                info!(version, name = %cs.name, gate = ?cs.gate, "gate off, leaving applied");
                report.gated.push(version);
                continue;
            }

            info!(version, name = %cs.name, "reverting changeset");
            report.retries += self.run_statements(exec, cs, &cs.down).await?;
            store.remove(version).await?;
            report.executed.push(version);
        }

        Ok(report)
    }

    async fn run_statements(
        &self,
        exec: &dyn StatementExecutor,
        cs: &Changeset,
        statements: &[String],
    ) -> Result<u32, MigrateError> {
        let mut retries = 0;
        for sql in statements {
            retries += self.run_one(exec, cs, sql).await?;
        }
        Ok(retries)
    }

    /// One statement, retried while the failure is transient and the policy allows.
    async fn run_one(
        &self,
        exec: &dyn StatementExecutor,
        cs: &Changeset,
        sql: &str,
    ) -> Result<u32, MigrateError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match exec.execute(sql).await {
                Ok(()) => return Ok(attempt - 1),
                Err(e) => e,
            };

            let delay = match err.class {
                ErrorClass::Transient => self.retry.next_delay(attempt),
                ErrorClass::Permanent => None,
            };
            match delay {
                Some(delay) => {
                    warn!(
                        version = cs.version,
                        attempt,
                        sqlstate = ?err.sqlstate,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying statement"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(MigrateError::Statement {
                        version: cs.version,
                        name: cs.name.clone(),
                        attempts: attempt,
                        source: err,
                    })
                }
            }
        }
    }
}
