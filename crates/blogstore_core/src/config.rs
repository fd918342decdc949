//! Store configuration.
//!
//! # Responsibility
//! - Describe where the store lives and how the connection pool behaves.
//! - Select the link-table synchronization strategy.
//!
//! # Invariants
//! - In-memory stores always run with exactly one pooled connection, since
//!   every SQLite in-memory connection is its own database.

use crate::db::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_CONNECTIONS: u32 = 4;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// How a many-to-many link set is rewritten on save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSyncStrategy {
    /// Delete every link row for the owner, then insert the desired rows, as
    /// two independent statements. A failure between them leaves zero links.
    #[default]
    FullReplace,
    /// Same delete-then-insert, executed inside one `BEGIN IMMEDIATE`
    /// transaction so a failed insert restores the previous link set.
    Transactional,
}

/// Connection and persistence settings for one logical store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file path. `None` opens a private in-memory database.
    pub database_path: Option<PathBuf>,
    /// Upper bound of pooled connections for file-backed stores.
    pub max_connections: u32,
    /// How long a caller waits for a free connection before a transient error.
    pub acquire_timeout_ms: u64,
    /// SQLite busy handler timeout applied to every connection.
    pub busy_timeout_ms: u64,
    pub link_sync: LinkSyncStrategy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            link_sync: LinkSyncStrategy::default(),
        }
    }
}

impl StoreConfig {
    /// Config for a private in-memory store.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Config for a file-backed store at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn with_link_sync(mut self, strategy: LinkSyncStrategy) -> Self {
        self.link_sync = strategy;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_acquire_timeout_ms(mut self, acquire_timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = acquire_timeout_ms;
        self
    }

    /// Rejects settings the pool cannot run with.
    pub fn validate(&self) -> DbResult<()> {
        if self.max_connections == 0 {
            return Err(DbError::Config(
                "max_connections must be greater than zero".to_string(),
            ));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(DbError::Config(
                "acquire_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if matches!(&self.database_path, Some(path) if path.as_os_str().is_empty()) {
            return Err(DbError::Config("database_path cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Pool size actually used for this config.
    pub fn effective_max_connections(&self) -> u32 {
        if self.database_path.is_some() {
            self.max_connections
        } else {
            1
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
