//! In-memory executor and version store, for tests and dry runs.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{MigrateError, StatementError};
use crate::migrator::{StatementExecutor, VersionStore};

/// Records every statement it is given. Failures queued with
/// [`fail_next`](Self::fail_next) are returned, in order, before anything
/// else is executed.
#[derive(Default)]
pub struct MemoryExecutor {
    executed: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<StatementError>>,
    attempts: Mutex<u32>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, err: StatementError) {
        lock(&self.failures).push_back(err);
    }

    /// Statements that succeeded, in order.
    pub fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }

    /// Every call to `execute`, failed ones included.
    pub fn attempts(&self) -> u32 {
        *lock(&self.attempts)
    }
}

#[async_trait]
impl StatementExecutor for MemoryExecutor {
    async fn execute(&self, sql: &str) -> Result<(), StatementError> {
        *lock(&self.attempts) += 1;
        if let Some(err) = lock(&self.failures).pop_front() {
            return Err(err);
        }
        lock(&self.executed).push(sql.to_string());
        Ok(())
    }
}

/// Applied versions held in a map.
#[derive(Default)]
pub struct MemoryVersionStore {
    applied: Mutex<BTreeMap<i64, String>>,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> Result<MutexGuard<'_, BTreeMap<i64, String>>, MigrateError> {
        self.applied
            .lock()
            .map_err(|_| MigrateError::VersionStore("version store lock poisoned".into()))
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn applied(&self) -> Result<Vec<i64>, MigrateError> {
        Ok(self.map()?.keys().copied().collect())
    }

    async fn record(&self, version: i64, name: &str) -> Result<(), MigrateError> {
        self.map()?.insert(version, name.to_string());
        Ok(())
    }

    async fn remove(&self, version: i64) -> Result<(), MigrateError> {
        self.map()?.remove(&version);
        Ok(())
    }
}

// A poisoned recorder only means another test thread panicked; keep recording.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
