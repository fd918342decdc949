//! Relational mapping layer for blogs, posts and tags.
//!
//! # Responsibility
//! - Map joined result rows into entity graphs (`row_mapper`).
//! - Own table/column metadata in one place (`catalog`).
//! - Compose paginated, filtered, joined SELECTs (`query`).
//! - Coordinate writes and many-to-many link upkeep (`coordinator`).
//! - Expose per-entity async facades (`blog_repo`, `post_repo`, `tag_repo`).
//!
//! # Invariants
//! - Every write validates the entity before a statement is sent.
//! - Facades return semantic errors (`NotFound`, `PartialLinkSync`) on top of
//!   classified store errors.

pub mod blog_repo;
pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod finder;
pub mod post_repo;
pub mod query;
pub mod row_mapper;
pub mod tag_repo;

use async_trait::async_trait;
use error::RepoResult;
use query::Pageable;

/// Operations every entity facade supports.
#[async_trait]
pub trait EntityRepository<E: Send + 'static>: Send + Sync {
    /// All entities, optionally paged and sorted.
    async fn find_all(&self, page: Option<&Pageable>) -> RepoResult<Vec<E>>;

    /// Zero or one entity; absence is `Ok(None)`.
    async fn find_by_id(&self, id: i64) -> RepoResult<Option<E>>;

    /// Inserts when `id` is unset, updates otherwise.
    ///
    /// The returned value is the input plus the assigned id, not a re-read.
    async fn save(&self, entity: E) -> RepoResult<E>;

    async fn delete_by_id(&self, id: i64) -> RepoResult<()>;

    async fn count(&self) -> RepoResult<u64>;
}
