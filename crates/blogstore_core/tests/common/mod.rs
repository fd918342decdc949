#![allow(dead_code)]

use async_trait::async_trait;
use blogstore_core::{
    Blog, BlogStore, DatabaseClient, DbError, DbResult, EntityRepository, LinkSyncStrategy, Post,
    RowStream, SqliteClient, Statement, StoreConfig, Tag,
};
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use rusqlite::ffi;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// File-backed store in a fresh temp directory.
pub struct TestStore {
    pub dir: TempDir,
    pub path: PathBuf,
    pub store: BlogStore,
}

pub fn file_config(dir: &TempDir) -> StoreConfig {
    StoreConfig::file(dir.path().join("blogstore.db"))
}

pub fn open_file_store(strategy: LinkSyncStrategy) -> TestStore {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir).with_link_sync(strategy);
    let path = config.database_path.clone().unwrap();
    let store = BlogStore::open(&config).unwrap();
    TestStore { dir, path, store }
}

/// Store whose every statement passes through a `RecordingClient`.
pub fn open_recording_store(strategy: LinkSyncStrategy) -> (TestStore, Arc<RecordingClient>) {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir).with_link_sync(strategy);
    let path = config.database_path.clone().unwrap();
    let client = RecordingClient::new(SqliteClient::open(&config).unwrap());
    let store = BlogStore::with_client(client.clone(), strategy);
    (TestStore { dir, path, store }, client)
}

pub fn date(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 30, 0).unwrap()
}

pub async fn seed_blog(store: &BlogStore, name: &str) -> Blog {
    store.blogs().save(Blog::new(name, "hd")).await.unwrap()
}

pub async fn seed_tags(store: &BlogStore, names: &[&str]) -> Vec<i64> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let tag = store.tags().save(Tag::new(*name)).await.unwrap();
        ids.push(tag.id.unwrap());
    }
    ids
}

pub async fn seed_post(store: &BlogStore, title: &str, tags: &[i64]) -> Post {
    let post = Post::new(title, date(1)).with_tags(tags.iter().copied());
    store.posts().save(post).await.unwrap()
}

/// Inserts an `app_user` row directly; the store has no user facade.
pub fn insert_user(path: &Path, login: &str) -> i64 {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute("INSERT INTO app_user (login) VALUES (?1)", [login])
        .unwrap();
    conn.last_insert_rowid()
}

/// Delegating client that records SQL and can fail chosen statements.
pub struct RecordingClient {
    inner: SqliteClient,
    statements: Mutex<Vec<String>>,
    fail_prefix: Mutex<Option<String>>,
}

impl RecordingClient {
    pub fn new(inner: SqliteClient) -> Arc<Self> {
        Arc::new(Self {
            inner,
            statements: Mutex::new(Vec::new()),
            fail_prefix: Mutex::new(None),
        })
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.statements.lock().unwrap().clear();
    }

    /// Every later statement whose SQL starts with `prefix` fails with an I/O error.
    pub fn fail_when_sql_starts_with(&self, prefix: &str) {
        *self.fail_prefix.lock().unwrap() = Some(prefix.to_string());
    }

    pub fn stop_failing(&self) {
        *self.fail_prefix.lock().unwrap() = None;
    }

    fn admit(&self, statement: &Statement) -> DbResult<()> {
        self.statements
            .lock()
            .unwrap()
            .push(statement.sql().to_string());
        let fail = self
            .fail_prefix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| statement.sql().starts_with(prefix));
        if fail {
            return Err(DbError::Sqlite(rusqlite::Error::SqliteFailure(
                ffi::Error::new(ffi::SQLITE_IOERR),
                Some("injected failure".to_string()),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseClient for RecordingClient {
    fn fetch(&self, statement: Statement) -> RowStream {
        match self.admit(&statement) {
            Ok(()) => self.inner.fetch(statement),
            Err(err) => stream::once(async move { Err(err) }).boxed(),
        }
    }

    async fn execute(&self, statement: Statement) -> DbResult<u64> {
        self.admit(&statement)?;
        self.inner.execute(statement).await
    }

    async fn insert(&self, statement: Statement) -> DbResult<i64> {
        self.admit(&statement)?;
        self.inner.insert(statement).await
    }

    async fn transaction(&self, statements: Vec<Statement>) -> DbResult<Vec<u64>> {
        for statement in &statements {
            self.admit(statement)?;
        }
        self.inner.transaction(statements).await
    }
}

/// Fails the test unless `repo` finds the entity with `id`.
pub async fn must_find<E, R>(repo: &R, id: i64) -> E
where
    E: Send + 'static,
    R: EntityRepository<E>,
{
    repo.find_by_id(id).await.unwrap().unwrap()
}
