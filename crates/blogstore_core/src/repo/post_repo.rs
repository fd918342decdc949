//! Post repository facade.
//!
//! # Responsibility
//! - Expose post CRUD plus the tag-link lifecycle.
//! - Join each post with its parent blog in one LEFT OUTER JOIN.
//!
//! # Invariants
//! - The primary query never joins tags. `find_by_id` fills `tags` with a
//!   second link-table read; list calls leave `tags` empty.
//! - The eager-relationship variants are the plain variants: the blog join is
//!   always performed and nothing deeper is loaded.

use super::catalog::{
    ColumnCatalog, LinkTable, BLOG_CATALOG, ENTITY_ALIAS, POST_CATALOG, POST_TAG_LINK,
};
use super::coordinator::{LinkRef, MappedEntity, OwnerLocks, PersistenceCoordinator};
use super::error::RepoResult;
use super::finder::{EntityFinder, EntityStream};
use super::query::{Criteria, Join, Pageable};
use super::row_mapper::{datetime_to_millis, map_optional, RowMapper};
use super::EntityRepository;
use crate::config::LinkSyncStrategy;
use crate::db::{DatabaseClient, DbResult, Row};
use crate::model::blog::Blog;
use crate::model::post::Post;
use crate::model::{PostId, TagId, ValidationError};
use async_trait::async_trait;
use chrono::SubsecRound;
use rusqlite::types::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

const BLOG_ALIAS: &str = "blog";

impl MappedEntity for Post {
    const ENTITY: &'static str = "Post";

    fn catalog() -> &'static ColumnCatalog {
        &POST_CATALOG
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Post::validate(self)
    }

    /// The store keeps millisecond timestamps.
    fn normalize(&mut self) {
        self.date = self.date.map(|date| date.trunc_subsecs(3));
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            self.title.clone().into(),
            self.content.clone().into(),
            self.date.as_ref().map(datetime_to_millis).into(),
            self.blog_id().into(),
        ]
    }

    fn owned_link(&self) -> Option<(LinkTable, BTreeSet<i64>)> {
        Some((POST_TAG_LINK, self.tags.clone()))
    }

    fn referencing_links() -> &'static [LinkRef] {
        &[LinkRef {
            link: POST_TAG_LINK,
            column: "post_id",
        }]
    }

    fn join() -> Option<Join> {
        Some(Join::new(&BLOG_CATALOG, BLOG_ALIAS, "blog_id"))
    }

    fn from_joined_row(row: &Row) -> DbResult<Self> {
        let mut post = Post::map_row(row, ENTITY_ALIAS)?;
        if let Some(blog) = map_optional::<Blog>(row, BLOG_ALIAS)? {
            post.blog = Some(blog);
        }
        Ok(post)
    }
}

/// Post persistence facade.
#[derive(Clone)]
pub struct PostRepository {
    finder: EntityFinder<Post>,
    coordinator: PersistenceCoordinator<Post>,
}

impl PostRepository {
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

    /// Streams posts joined with their blog; drop the stream to cancel.
    pub fn stream_all(
        &self,
        page: Option<&Pageable>,
        criteria: Option<&Criteria>,
    ) -> RepoResult<EntityStream<Post>> {
        self.finder.stream(page, criteria)
    }

    /// Lists posts matching filters on post columns only.
    pub async fn find_all_by(
        &self,
        page: Option<&Pageable>,
        criteria: &Criteria,
    ) -> RepoResult<Vec<Post>> {
        self.finder.find_all(page, Some(criteria)).await
    }

    pub async fn find_all_with_eager_relationships(
        &self,
        page: Option<&Pageable>,
    ) -> RepoResult<Vec<Post>> {
        self.find_all(page).await
    }

    pub async fn find_one_with_eager_relationships(&self, id: PostId) -> RepoResult<Option<Post>> {
        self.find_by_id(id).await
    }

    /// Tag ids currently linked to `id`.
    pub async fn find_tag_ids(&self, id: PostId) -> RepoResult<BTreeSet<TagId>> {
        self.coordinator.find_related_ids(&POST_TAG_LINK, id).await
    }

    /// Inserts the post row only; links are written by `save`.
    pub async fn insert(&self, post: Post) -> RepoResult<Post> {
        self.coordinator.insert(post).await
    }

    /// Updates scalar columns only.
    pub async fn update(&self, post: Post) -> RepoResult<Post> {
        self.coordinator.update_existing(post).await
    }

    /// Rewrites the tag set of `id` without touching the post row.
    pub async fn replace_tags(&self, id: PostId, tags: &BTreeSet<TagId>) -> RepoResult<()> {
        self.coordinator
            .sync_link_table(&POST_TAG_LINK, id, tags)
            .await
    }

    /// Checks that no link row points at a deleted post.
    pub async fn verify_link_integrity(&self) -> RepoResult<()> {
        self.coordinator.verify_link_integrity(&POST_TAG_LINK).await
    }
}

#[async_trait]
impl EntityRepository<Post> for PostRepository {
    async fn find_all(&self, page: Option<&Pageable>) -> RepoResult<Vec<Post>> {
        self.finder.find_all(page, None).await
    }

    async fn find_by_id(&self, id: PostId) -> RepoResult<Option<Post>> {
        let Some(mut post) = self.finder.find_one(&Criteria::by_id(id)).await? else {
            return Ok(None);
        };
        post.tags = self.find_tag_ids(id).await?;
        Ok(Some(post))
    }

    async fn save(&self, post: Post) -> RepoResult<Post> {
        self.coordinator.save(post).await
    }

    async fn delete_by_id(&self, id: PostId) -> RepoResult<()> {
        self.coordinator.delete_by_id(id).await
    }

    async fn count(&self) -> RepoResult<u64> {
        self.finder.count(None).await
    }
}
