//! Store entry point wiring one client into the three facades.

use crate::config::{LinkSyncStrategy, StoreConfig};
use crate::db::{DatabaseClient, DbResult, SqliteClient};
use crate::repo::blog_repo::BlogRepository;
use crate::repo::coordinator::OwnerLocks;
use crate::repo::post_repo::PostRepository;
use crate::repo::tag_repo::TagRepository;
use std::sync::Arc;

/// Blog, post and tag repositories sharing a client and owner locks.
#[derive(Clone)]
pub struct BlogStore {
    client: Arc<dyn DatabaseClient>,
    blogs: BlogRepository,
    posts: PostRepository,
    tags: TagRepository,
}

impl BlogStore {
    /// Opens a pooled SQLite store and applies migrations.
    pub fn open(config: &StoreConfig) -> DbResult<Self> {
        let client = SqliteClient::open(config)?;
        Ok(Self::with_client(Arc::new(client), config.link_sync))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(&StoreConfig::in_memory())
    }

    /// Builds the facades over any client, e.g. an instrumented wrapper.
    pub fn with_client(client: Arc<dyn DatabaseClient>, strategy: LinkSyncStrategy) -> Self {
        let locks = Arc::new(OwnerLocks::default());
        Self {
            blogs: BlogRepository::new(Arc::clone(&client), strategy, Arc::clone(&locks)),
            posts: PostRepository::new(Arc::clone(&client), strategy, Arc::clone(&locks)),
            tags: TagRepository::new(Arc::clone(&client), strategy, locks),
            client,
        }
    }

    pub fn blogs(&self) -> &BlogRepository {
        &self.blogs
    }

    pub fn posts(&self) -> &PostRepository {
        &self.posts
    }

    pub fn tags(&self) -> &TagRepository {
        &self.tags
    }

    pub fn client(&self) -> &Arc<dyn DatabaseClient> {
        &self.client
    }
}
