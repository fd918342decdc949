//! Repository error taxonomy.
//!
//! # Invariants
//! - A zero-row update or delete surfaces as `NotFound`, never as `Db`.
//! - `PartialLinkSync` is only raised after the delete phase committed, so
//!   callers can tell "links gone, retry the sync" apart from a clean failure.

use super::query::QueryError;
use crate::db::DbError;
use crate::model::ValidationError;
use thiserror::Error;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("referential inconsistency: {0}")]
    ReferentialInconsistency(String),
    #[error("transient store failure: {0}")]
    TransientStore(#[source] DbError),
    #[error(
        "link sync on {link_table} for owner {owner_id} removed existing links \
         but failed to insert {desired} new ones: {source}"
    )]
    PartialLinkSync {
        link_table: &'static str,
        owner_id: i64,
        desired: usize,
        #[source]
        source: DbError,
    },
    #[error(transparent)]
    InvalidQuery(#[from] QueryError),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Db(DbError),
}

impl RepoError {
    /// Whether repeating the whole operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientStore(_) | Self::PartialLinkSync { .. })
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_transient() {
            Self::TransientStore(value)
        } else if value.is_foreign_key_violation() {
            Self::ReferentialInconsistency(value.to_string())
        } else {
            Self::Db(value)
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        DbError::Sqlite(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::RepoError;
    use crate::db::DbError;
    use rusqlite::ffi;

    #[test]
    fn db_errors_are_classified() {
        let busy = rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None);
        assert!(matches!(RepoError::from(busy), RepoError::TransientStore(_)));

        let fk = rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_CONSTRAINT_FOREIGNKEY),
            Some("FOREIGN KEY constraint failed".to_string()),
        );
        assert!(matches!(
            RepoError::from(fk),
            RepoError::ReferentialInconsistency(message) if message.contains("FOREIGN KEY")
        ));

        let other = DbError::MissingColumn("e_id".to_string());
        let err = RepoError::from(other);
        assert!(matches!(err, RepoError::Db(_)));
        assert!(!err.is_retryable());
    }
}
