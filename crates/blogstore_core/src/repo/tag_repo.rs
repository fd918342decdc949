//! Tag repository facade.

use super::catalog::{ColumnCatalog, POST_TAG_LINK, TAG_CATALOG};
use super::coordinator::{LinkRef, MappedEntity, OwnerLocks, PersistenceCoordinator};
use super::error::RepoResult;
use super::finder::{EntityFinder, EntityStream};
use super::query::{Criteria, Pageable};
use super::EntityRepository;
use crate::config::LinkSyncStrategy;
use crate::db::DatabaseClient;
use crate::model::tag::Tag;
use crate::model::{TagId, ValidationError};
use async_trait::async_trait;
use rusqlite::types::Value;
use std::sync::Arc;

impl MappedEntity for Tag {
    const ENTITY: &'static str = "Tag";

    fn catalog() -> &'static ColumnCatalog {
        &TAG_CATALOG
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Tag::validate(self)
    }

    fn column_values(&self) -> Vec<Value> {
        vec![self.name.clone().into()]
    }

    fn referencing_links() -> &'static [LinkRef] {
        &[LinkRef {
            link: POST_TAG_LINK,
            column: "tag_id",
        }]
    }
}

/// Tag persistence facade.
#[derive(Clone)]
pub struct TagRepository {
    finder: EntityFinder<Tag>,
    coordinator: PersistenceCoordinator<Tag>,
}

impl TagRepository {
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
    ) -> RepoResult<EntityStream<Tag>> {
        self.finder.stream(page, criteria)
    }

    pub async fn find_all_by(
        &self,
        page: Option<&Pageable>,
        criteria: &Criteria,
    ) -> RepoResult<Vec<Tag>> {
        self.finder.find_all(page, Some(criteria)).await
    }

    pub async fn insert(&self, tag: Tag) -> RepoResult<Tag> {
        self.coordinator.insert(tag).await
    }

    pub async fn update(&self, tag: Tag) -> RepoResult<Tag> {
        self.coordinator.update_existing(tag).await
    }
}

#[async_trait]
impl EntityRepository<Tag> for TagRepository {
    async fn find_all(&self, page: Option<&Pageable>) -> RepoResult<Vec<Tag>> {
        self.finder.find_all(page, None).await
    }

    async fn find_by_id(&self, id: TagId) -> RepoResult<Option<Tag>> {
        self.finder.find_one(&Criteria::by_id(id)).await
    }

    async fn save(&self, tag: Tag) -> RepoResult<Tag> {
        self.coordinator.save(tag).await
    }

    /// Removes post links to the tag first, then the tag.
    async fn delete_by_id(&self, id: TagId) -> RepoResult<()> {
        self.coordinator.delete_by_id(id).await
    }

    async fn count(&self) -> RepoResult<u64> {
        self.finder.count(None).await
    }
}
