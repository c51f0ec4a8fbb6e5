use thiserror::Error;

/// Whether a failed statement is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Lock contention, deadlock, serialization conflict, timeout, lost connection.
    Transient,
    /// Anything else: syntax, missing relation, constraint violation.
    Permanent,
}

/// Postgres SQLSTATE codes that clear up on their own.
pub const TRANSIENT_SQLSTATES: &[&str] = &[
    "55P03", // lock_not_available (lock_timeout)
    "40P01", // deadlock_detected
    "40001", // serialization_failure
    "57014", // query_canceled (statement_timeout)
];

pub fn classify_sqlstate(code: &str) -> ErrorClass {
    if TRANSIENT_SQLSTATES.contains(&code) {
        ErrorClass::Transient
    } else {
        ErrorClass::Permanent
    }
}

/// A single statement failed once.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StatementError {
    pub class: ErrorClass,
    pub sqlstate: Option<String>,
    pub message: String,
}

impl StatementError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Transient,
            sqlstate: None,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Permanent,
            sqlstate: None,
            message: message.into(),
        }
    }

    /// Build from a SQLSTATE, classifying it.
    pub fn with_sqlstate(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            class: classify_sqlstate(&code),
            sqlstate: Some(code),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("changeset {version} ({name}) failed after {attempts} attempt(s): {source}")]
    Statement {
        version: i64,
        name: String,
        attempts: u32,
        #[source]
        source: StatementError,
    },

    #[error("cannot register changeset {version}: {reason}")]
    Registration { version: i64, reason: String },

    #[error("applied version {0} has no registered changeset")]
    UnknownVersion(i64),

    #[error("version store error: {0}")]
    VersionStore(String),

    #[error("database error: {0}")]
    Database(String),
}

impl MigrateError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Statement { source, .. } => source.class,
            _ => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}
