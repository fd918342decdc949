//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Build the r2d2 connection pool backing the async client.
//! - Open standalone file or in-memory connections for admin/test use.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable pool or connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned pools and connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::DbResult;
use crate::config::StoreConfig;
use log::{error, info};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const STANDALONE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool type shared by every client handle of one store.
pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;

/// Builds a migrated connection pool for `config`.
///
/// # Side effects
/// - Opens at least one connection and applies pending migrations.
/// - Emits `db_open` logging events with duration and status.
pub fn open_pool(config: &StoreConfig) -> DbResult<SqlitePool> {
    config.validate()?;
    let started_at = Instant::now();
    let mode = if config.database_path.is_some() {
        "file"
    } else {
        "memory"
    };
    info!(
        "event=db_open module=db status=start mode={mode} max_connections={}",
        config.effective_max_connections()
    );

    match build_pool(config) {
        Ok(pool) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(pool)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_pool_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens a standalone SQLite database file and applies all pending migrations.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let mut conn = Connection::open(path)?;
    bootstrap_connection(&mut conn)?;
    Ok(conn)
}

/// Opens a standalone in-memory SQLite database with all migrations applied.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let mut conn = Connection::open_in_memory()?;
    bootstrap_connection(&mut conn)?;
    Ok(conn)
}

fn build_pool(config: &StoreConfig) -> DbResult<SqlitePool> {
    let busy_timeout = config.busy_timeout();
    let (manager, wal) = match &config.database_path {
        Some(path) => (SqliteConnectionManager::file(path), true),
        None => (SqliteConnectionManager::memory(), false),
    };
    let manager = manager.with_init(move |conn| configure_connection(conn, busy_timeout, wal));

    let mut builder = r2d2::Pool::builder()
        .max_size(config.effective_max_connections())
        .connection_timeout(config.acquire_timeout());
    if config.database_path.is_none() {
        // The single in-memory connection *is* the database; never recycle it.
        builder = builder
            .min_idle(Some(1))
            .idle_timeout(None)
            .max_lifetime(None);
    }
    let pool = builder.build(manager)?;

    let mut conn = pool.get()?;
    apply_migrations(&mut conn)?;
    drop(conn);

    Ok(pool)
}

fn configure_connection(
    conn: &mut Connection,
    busy_timeout: Duration,
    wal: bool,
) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    if wal {
        conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
    }
    Ok(())
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<()> {
    configure_connection(conn, STANDALONE_BUSY_TIMEOUT, false)?;
    apply_migrations(conn)?;
    Ok(())
}
