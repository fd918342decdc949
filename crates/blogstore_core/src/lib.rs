//! Manual relational mapping for blogs, posts and tags over SQLite.
//! Mapping, query composition and link upkeep live in `repo`.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;

pub use config::{LinkSyncStrategy, StoreConfig};
pub use db::{DatabaseClient, DbError, DbResult, Row, RowStream, SqliteClient, Statement};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::blog::Blog;
pub use model::post::Post;
pub use model::tag::Tag;
pub use model::user::AppUser;
pub use model::{BlogId, PostId, TagId, UserId, ValidationError};
pub use repo::blog_repo::BlogRepository;
pub use repo::error::{RepoError, RepoResult};
pub use repo::post_repo::PostRepository;
pub use repo::query::{Criteria, Direction, Filter, Operator, Pageable, QueryError, Sort};
pub use repo::tag_repo::TagRepository;
pub use repo::EntityRepository;
pub use store::BlogStore;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
