//! Changesets and the ordered set they are registered into.

use std::collections::HashSet;

use crate::error::MigrateError;

/// A versioned pair of up/down statement lists.
///
/// A gated changeset is enabled only when its flag is set; the gate covers
/// both directions as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub version: i64,
    pub name: String,
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub gate: Option<String>,
}

impl Changeset {
    pub fn new(version: i64, name: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            up: Vec::new(),
            down: Vec::new(),
            gate: None,
        }
    }

    pub fn up(mut self, sql: impl Into<String>) -> Self {
        self.up.push(sql.into());
        self
    }

    pub fn down(mut self, sql: impl Into<String>) -> Self {
        self.down.push(sql.into());
        self
    }

    pub fn gated_by(mut self, flag: impl Into<String>) -> Self {
        self.gate = Some(flag.into());
        self
    }

    pub fn is_enabled(&self, flags: &FeatureFlags) -> bool {
        self.gate.as_deref().map_or(true, |g| flags.is_enabled(g))
    }
}

/// Named boolean switches consulted by changeset gates.
#[derive(Debug, Clone, Default)]
pub struct FeatureFlags {
    enabled: HashSet<String>,
}

impl FeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, flag: impl Into<String>, on: bool) -> Self {
        self.set(flag, on);
        self
    }

    pub fn set(&mut self, flag: impl Into<String>, on: bool) {
        let flag = flag.into();
        if on {
            self.enabled.insert(flag);
        } else {
            self.enabled.remove(&flag);
        }
    }

    pub fn is_enabled(&self, flag: &str) -> bool {
        self.enabled.contains(flag)
    }
}

/// Changesets in strictly increasing version order.
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    changesets: Vec<Changeset>,
}

impl MigrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a changeset. Its version must be greater than every version
    /// already registered.
    pub fn register(&mut self, changeset: Changeset) -> Result<(), MigrateError> {
        if let Some(last) = self.changesets.last() {
            if changeset.version == last.version {
                return Err(MigrateError::Registration {
                    version: changeset.version,
                    reason: "duplicate version".into(),
                });
            }
            if changeset.version < last.version {
                return Err(MigrateError::Registration {
                    version: changeset.version,
                    reason: format!("must be greater than {}", last.version),
                });
            }
        }
        self.changesets.push(changeset);
        Ok(())
    }

    pub fn get(&self, version: i64) -> Option<&Changeset> {
        self.changesets.iter().find(|c| c.version == version)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Changeset> {
        self.changesets.iter()
    }

    pub fn len(&self) -> usize {
        self.changesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changesets.is_empty()
    }
}
