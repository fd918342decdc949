//! SQLite storage bootstrap, schema migrations and the async execution client.
//!
//! # Responsibility
//! - Open and configure pooled SQLite connections for the blog store.
//! - Apply schema migrations in deterministic order.
//! - Expose the generic async execution interface used by repositories.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write application data before migrations succeed.
//! - Every pooled connection has `foreign_keys=ON`.

use rusqlite::ffi;
use rusqlite::types::FromSqlError;
use rusqlite::ErrorCode;
use thiserror::Error;

mod client;
pub mod migrations;
mod open;
mod row;

pub use client::{DatabaseClient, RowStream, SqliteClient};
pub use open::{open_db, open_db_in_memory, open_pool, SqlitePool};
pub use row::{Row, Statement};

pub type DbResult<T> = Result<T, DbError>;

/// Transport-level failures raised below the repository layer.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("result row has no column `{0}`")]
    MissingColumn(String),
    #[error("column `{column}` has an unexpected value: {source}")]
    ColumnType {
        column: String,
        #[source]
        source: FromSqlError,
    },
    #[error("blocking database task failed: {0}")]
    Task(String),
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl DbError {
    /// Returns whether the failure is a connection/contention fault the caller
    /// may retry as-is.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Pool(_) => true,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Returns whether SQLite rejected the statement on a foreign key check.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == ErrorCode::ConstraintViolation
                    && err.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY
            }
            _ => false,
        }
    }
}
