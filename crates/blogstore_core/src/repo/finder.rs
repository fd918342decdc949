//! Generic read path: compose, stream, map.

use super::coordinator::MappedEntity;
use super::error::{RepoError, RepoResult};
use super::query::{Criteria, Pageable, SelectQuery};
use crate::db::{DatabaseClient, Statement};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use std::marker::PhantomData;
use std::sync::Arc;

/// Lazily mapped entities. Dropping the stream cancels the underlying query.
pub type EntityStream<E> = BoxStream<'static, RepoResult<E>>;

pub struct EntityFinder<E> {
    client: Arc<dyn DatabaseClient>,
    entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityFinder<E> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            entity: PhantomData,
        }
    }
}

impl<E: MappedEntity> EntityFinder<E> {
    pub fn new(client: Arc<dyn DatabaseClient>) -> Self {
        Self {
            client,
            entity: PhantomData,
        }
    }

    /// The SELECT that backs every read of `E`.
    pub fn select_statement(
        page: Option<&Pageable>,
        criteria: Option<&Criteria>,
    ) -> RepoResult<Statement> {
        let statement = SelectQuery::from(E::catalog())
            .left_join(E::join())
            .filter(criteria)
            .paginate(page)
            .build()?;
        Ok(statement)
    }

    pub fn stream(
        &self,
        page: Option<&Pageable>,
        criteria: Option<&Criteria>,
    ) -> RepoResult<EntityStream<E>> {
        let statement = Self::select_statement(page, criteria)?;
        Ok(self
            .client
            .fetch(statement)
            .map(|row| -> RepoResult<E> {
                let row = row?;
                Ok(E::from_joined_row(&row)?)
            })
            .boxed())
    }

    pub async fn find_all(
        &self,
        page: Option<&Pageable>,
        criteria: Option<&Criteria>,
    ) -> RepoResult<Vec<E>> {
        self.stream(page, criteria)?.try_collect().await
    }

    /// First matching entity; the rest of the stream is dropped unread.
    pub async fn find_one(&self, criteria: &Criteria) -> RepoResult<Option<E>> {
        let mut stream = self.stream(None, Some(criteria))?;
        stream.try_next().await
    }

    pub async fn count(&self, criteria: Option<&Criteria>) -> RepoResult<u64> {
        let statement = SelectQuery::from(E::catalog())
            .filter(criteria)
            .build_count()?;
        let row = self
            .client
            .fetch(statement)
            .try_next()
            .await?
            .ok_or_else(|| RepoError::InvalidData("COUNT(*) returned no row".to_string()))?;
        let total: i64 = row.get("total")?;
        u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative row count {total}")))
    }
}
