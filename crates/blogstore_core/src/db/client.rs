//! Generic async execution interface and its pooled SQLite implementation.
//!
//! # Responsibility
//! - Run parameterized statements off the async executor threads.
//! - Stream result rows lazily to async consumers.
//!
//! # Invariants
//! - `fetch` takes no connection until its stream is first polled.
//! - Dropping a row stream stops the producer and returns its connection.
//! - Table/column identifiers passed to the helpers come from static catalogs
//!   and are never caller input; values are always bound.

use super::open::{open_pool, SqlitePool};
use super::{DbError, DbResult, Row, Statement};
use crate::config::StoreConfig;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use log::trace;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const ROW_CHANNEL_CAPACITY: usize = 64;

/// Lazily produced result rows.
pub type RowStream = BoxStream<'static, DbResult<Row>>;

/// Async access to one logical store.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Runs a query and streams its rows.
    fn fetch(&self, statement: Statement) -> RowStream;

    /// Runs a write statement and returns the affected row count.
    async fn execute(&self, statement: Statement) -> DbResult<u64>;

    /// Runs an `INSERT` and returns the store-assigned row id.
    async fn insert(&self, statement: Statement) -> DbResult<i64>;

    /// Runs all statements on one connection inside one immediate transaction.
    async fn transaction(&self, statements: Vec<Statement>) -> DbResult<Vec<u64>>;

    /// `UPDATE {table} SET col = ?, ... WHERE id = ?`.
    async fn update_by_id(
        &self,
        table: &str,
        columns: &[&str],
        values: Vec<Value>,
        id: i64,
    ) -> DbResult<u64> {
        let assignments = columns
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = Statement::new(format!("UPDATE {table} SET {assignments} WHERE id = ?"))
            .bind_all(values)
            .bind(id);
        self.execute(statement).await
    }

    /// `DELETE FROM {table} WHERE {column} = ?`.
    async fn delete_where(&self, table: &str, column: &str, value: Value) -> DbResult<u64> {
        let statement =
            Statement::new(format!("DELETE FROM {table} WHERE {column} = ?")).bind(value);
        self.execute(statement).await
    }
}

/// Pooled SQLite client. Cloning shares the pool.
#[derive(Clone)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Opens (and migrates) the store described by `config`.
    pub fn open(config: &StoreConfig) -> DbResult<Self> {
        Ok(Self::from_pool(open_pool(config)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(&StoreConfig::in_memory())
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connections currently parked in the pool.
    pub fn idle_connections(&self) -> u32 {
        self.pool.state().idle_connections
    }

    async fn with_connection<T, F>(&self, work: F) -> DbResult<T>
    where
        F: FnOnce(&mut Connection) -> DbResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            work(&mut conn)
        })
        .await
        .map_err(|err| DbError::Task(err.to_string()))?
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn fetch(&self, statement: Statement) -> RowStream {
        let pool = self.pool.clone();
        stream::once(async move {
            let (tx, rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);
            tokio::task::spawn_blocking(move || {
                if let Err(err) = pump_rows(&pool, &statement, &tx) {
                    let _ = tx.blocking_send(Err(err));
                }
            });
            ReceiverStream::new(rx)
        })
        .flatten()
        .boxed()
    }

    async fn execute(&self, statement: Statement) -> DbResult<u64> {
        self.with_connection(move |conn| {
            let changed = conn.execute(statement.sql(), params_from_iter(statement.params()))?;
            Ok(changed as u64)
        })
        .await
    }

    async fn insert(&self, statement: Statement) -> DbResult<i64> {
        self.with_connection(move |conn| {
            conn.execute(statement.sql(), params_from_iter(statement.params()))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn transaction(&self, statements: Vec<Statement>) -> DbResult<Vec<u64>> {
        self.with_connection(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut affected = Vec::with_capacity(statements.len());
            for statement in &statements {
                let changed = tx.execute(statement.sql(), params_from_iter(statement.params()))?;
                affected.push(changed as u64);
            }
            tx.commit()?;
            Ok(affected)
        })
        .await
    }
}

/// Runs on a blocking thread; returns early once the consumer hangs up.
fn pump_rows(
    pool: &SqlitePool,
    statement: &Statement,
    tx: &mpsc::Sender<DbResult<Row>>,
) -> DbResult<()> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(statement.sql())?;
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();

    let mut rows = stmt.query(params_from_iter(statement.params()))?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(row.get::<_, Value>(index)?);
        }
        if tx.blocking_send(Ok(Row::new(columns.clone(), values))).is_err() {
            trace!("event=row_stream module=db status=cancelled");
            return Ok(());
        }
    }
    Ok(())
}
