//! PostgreSQL executor and version store.
//!
//! # Feature Flag
//! Requires the `postgres` feature:
//! ```toml
//! chainsink-migrate = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! # Schema
//! Applied versions live in `chainsink_migrations`, created on connect.
//!
//! # Statement logging
//! [`connect_options`] with `log_queries = true` has sqlx log every statement
//! at `info`; otherwise statement logging is off.

use std::str::FromStr;

use async_trait::async_trait;
use log::LevelFilter;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Executor, PgPool, Row};
use tracing::info;

use crate::error::{ErrorClass, MigrateError, StatementError};
use crate::migrator::{StatementExecutor, VersionStore};

pub const VERSION_TABLE: &str = "chainsink_migrations";

/// Pooled Postgres connection implementing both migrator seams.
#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Connect with statement logging off and make sure the version table exists.
    pub async fn connect(database_url: &str) -> Result<Self, MigrateError> {
        Self::connect_with(connect_options(database_url, false)?).await
    }

    pub async fn connect_with(options: PgConnectOptions) -> Result<Self, MigrateError> {
        let pool = PgPoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::Database(format!("postgres connect: {e}")))?;

        let exec = Self { pool };
        exec.init_schema().await?;
        info!("PgExecutor connected");
        Ok(exec)
    }

    async fn init_schema(&self) -> Result<(), MigrateError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chainsink_migrations (
                version    BIGINT PRIMARY KEY,
                name       TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MigrateError::Database(format!("create {VERSION_TABLE}: {e}")))?;
        Ok(())
    }
}

/// Parse `database_url` and set the statement log level from `log_queries`.
pub fn connect_options(database_url: &str, log_queries: bool) -> Result<PgConnectOptions, MigrateError> {
    let options = PgConnectOptions::from_str(database_url)
        .map_err(|e| MigrateError::Database(format!("postgres url: {e}")))?;
    let level = if log_queries { LevelFilter::Info } else { LevelFilter::Off };
    Ok(options.log_statements(level))
}

/// Map a driver error onto the retry classification.
pub fn statement_error(e: &sqlx::Error) -> StatementError {
    match e {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => StatementError::with_sqlstate(code.as_ref(), db.message()),
            None => StatementError::permanent(db.message()),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StatementError::transient(e.to_string()),
        other => StatementError {
            class: ErrorClass::Permanent,
            sqlstate: None,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl StatementExecutor for PgExecutor {
    async fn execute(&self, sql: &str) -> Result<(), StatementError> {
        // simple-query protocol: scripts with several statements are accepted
        (&self.pool)
            .execute(sql)
            .await
            .map(|_| ())
            .map_err(|e| statement_error(&e))
    }
}

#[async_trait]
impl VersionStore for PgExecutor {
    async fn applied(&self) -> Result<Vec<i64>, MigrateError> {
        let rows = sqlx::query("SELECT version FROM chainsink_migrations ORDER BY version")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MigrateError::VersionStore(e.to_string()))?;
        rows.iter()
            .map(|r| {
                r.try_get::<i64, _>("version")
                    .map_err(|e| MigrateError::VersionStore(e.to_string()))
            })
            .collect()
    }

    async fn record(&self, version: i64, name: &str) -> Result<(), MigrateError> {
        sqlx::query(
            "INSERT INTO chainsink_migrations (version, name) VALUES ($1, $2)
             ON CONFLICT (version) DO NOTHING",
        )
        .bind(version)
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| MigrateError::VersionStore(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, version: i64) -> Result<(), MigrateError> {
        sqlx::query("DELETE FROM chainsink_migrations WHERE version = $1")
            .bind(version)
            .execute(&self.pool)
            .await
            .map_err(|e| MigrateError::VersionStore(e.to_string()))?;
        Ok(())
    }
}
