//! Blog repository facade.
//!
//! Each blog is joined with its owning user in one LEFT OUTER JOIN.

use super::catalog::{ColumnCatalog, BLOG_CATALOG, ENTITY_ALIAS, USER_CATALOG};
use super::coordinator::{MappedEntity, OwnerLocks, PersistenceCoordinator};
use super::error::RepoResult;
use super::finder::{EntityFinder, EntityStream};
use super::query::{Criteria, Join, Pageable};
use super::row_mapper::{map_optional, RowMapper};
use super::EntityRepository;
use crate::config::LinkSyncStrategy;
use crate::db::{DatabaseClient, DbResult, Row};
use crate::model::blog::Blog;
use crate::model::user::AppUser;
use crate::model::{BlogId, ValidationError};
use async_trait::async_trait;
use rusqlite::types::Value;
use std::sync::Arc;

const OWNER_ALIAS: &str = "owner";

impl MappedEntity for Blog {
    const ENTITY: &'static str = "Blog";

    fn catalog() -> &'static ColumnCatalog {
        &BLOG_CATALOG
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Blog::validate(self)
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            self.name.clone().into(),
            self.handle.clone().into(),
            self.user_id().into(),
        ]
    }

    fn join() -> Option<Join> {
        Some(Join::new(&USER_CATALOG, OWNER_ALIAS, "user_id"))
    }

    fn from_joined_row(row: &Row) -> DbResult<Self> {
        let mut blog = Blog::map_row(row, ENTITY_ALIAS)?;
        if let Some(user) = map_optional::<AppUser>(row, OWNER_ALIAS)? {
            blog.user = Some(user);
        }
        Ok(blog)
    }
}

/// Blog persistence facade.
#[derive(Clone)]
pub struct BlogRepository {
    finder: EntityFinder<Blog>,
    coordinator: PersistenceCoordinator<Blog>,
}

impl BlogRepository {
    pub fn new(
        client: Arc<dyn DatabaseClient>,
        strategy: LinkSyncStrategy,
        locks: Arc<OwnerLocks>,
    ) -> Self {
        Self {
            finder: EntityFinder::new(Arc::clone(&client)),
            coordinator: PersistenceCoordinator::new(client, strategy, locks),
        }
    }

    pub fn stream_all(
        &self,
        page: Option<&Pageable>,
        criteria: Option<&Criteria>,
    ) -> RepoResult<EntityStream<Blog>> {
        self.finder.stream(page, criteria)
    }

    pub async fn find_all_by(
        &self,
        page: Option<&Pageable>,
        criteria: &Criteria,
    ) -> RepoResult<Vec<Blog>> {
        self.finder.find_all(page, Some(criteria)).await
    }

    pub async fn insert(&self, blog: Blog) -> RepoResult<Blog> {
        self.coordinator.insert(blog).await
    }

    pub async fn update(&self, blog: Blog) -> RepoResult<Blog> {
        self.coordinator.update_existing(blog).await
    }
}

#[async_trait]
impl EntityRepository<Blog> for BlogRepository {
    async fn find_all(&self, page: Option<&Pageable>) -> RepoResult<Vec<Blog>> {
        self.finder.find_all(page, None).await
    }

    async fn find_by_id(&self, id: BlogId) -> RepoResult<Option<Blog>> {
        self.finder.find_one(&Criteria::by_id(id)).await
    }

    async fn save(&self, blog: Blog) -> RepoResult<Blog> {
        self.coordinator.save(blog).await
    }

    /// Fails with `ReferentialInconsistency` while posts still reference it.
    async fn delete_by_id(&self, id: BlogId) -> RepoResult<()> {
        self.coordinator.delete_by_id(id).await
    }

    async fn count(&self) -> RepoResult<u64> {
        self.finder.count(None).await
    }
}
