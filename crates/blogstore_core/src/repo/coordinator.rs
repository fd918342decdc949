//! Generic persistence coordinator.
//!
//! # Responsibility
//! - Insert, update and save any mapped entity through the async client.
//! - Rewrite many-to-many link tables from an owner's desired id set.
//! - Delete entities after clearing the link rows that reference them.
//!
//! # Invariants
//! - Link synchronization starts only after the owner's insert/update
//!   succeeded with at least one affected row.
//! - Link rows are removed before the row they reference.
//! - A save of a link owner holds the owner lock from its row write through
//!   the link sync; deletes take the same lock. Concurrent saves and deletes
//!   of one owner id never interleave.
//! - `save` returns the caller's entity (plus the assigned id); it never
//!   re-reads the row.

use super::catalog::{ColumnCatalog, LinkTable, ENTITY_ALIAS};
use super::error::{RepoError, RepoResult};
use super::query::Join;
use super::row_mapper::RowMapper;
use crate::config::LinkSyncStrategy;
use crate::db::{DatabaseClient, DbResult, Row, Statement};
use crate::model::ValidationError;
use futures::TryStreamExt;
use log::{debug, warn};
use rusqlite::types::Value;
use std::collections::{BTreeSet, HashMap};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// A link-table column that references an entity's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRef {
    pub link: LinkTable,
    pub column: &'static str,
}

/// Storage description of one entity: catalog, mapper and link tables.
pub trait MappedEntity: RowMapper + Clone + Send + Sync + 'static {
    const ENTITY: &'static str;

    fn catalog() -> &'static ColumnCatalog;

    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    fn validate(&self) -> Result<(), ValidationError>;

    /// Brings values to the precision the store keeps, so a saved entity
    /// equals its reloaded form.
    fn normalize(&mut self) {}

    /// Values for `catalog().writable_columns()`, in the same order.
    fn column_values(&self) -> Vec<Value>;

    /// Link table owned by this entity and the ids it should contain.
    fn owned_link(&self) -> Option<(LinkTable, BTreeSet<i64>)> {
        None
    }

    /// Link columns to clear before deleting a row of this entity.
    fn referencing_links() -> &'static [LinkRef] {
        &[]
    }

    /// Single-level relation joined into every SELECT.
    fn join() -> Option<Join> {
        None
    }

    /// Maps one (possibly joined) result row.
    fn from_joined_row(row: &Row) -> DbResult<Self> {
        Self::map_row(row, ENTITY_ALIAS)
    }
}

/// Per-owner async locks keyed by `(link table, owner id)`.
#[derive(Debug, Default)]
pub struct OwnerLocks {
    slots: Mutex<HashMap<(&'static str, i64), Arc<tokio::sync::Mutex<()>>>>,
}

impl OwnerLocks {
    pub async fn lock(&self, table: &'static str, owner_id: i64) -> OwnerGuard<'_> {
        let key = (table, owner_id);
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key).or_default())
        };
        let guard = Arc::clone(&slot).lock_owned().await;
        OwnerGuard {
            locks: self,
            key,
            slot,
            guard: Some(guard),
        }
    }

    /// Number of owners currently holding or waiting on a lock.
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

pub struct OwnerGuard<'a> {
    locks: &'a OwnerLocks,
    key: (&'static str, i64),
    slot: Arc<tokio::sync::Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for OwnerGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut slots = self
            .locks
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Only the map and this guard still hold the slot: nobody is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}

/// Write path shared by all entity repositories.
pub struct PersistenceCoordinator<E> {
    client: Arc<dyn DatabaseClient>,
    strategy: LinkSyncStrategy,
    locks: Arc<OwnerLocks>,
    entity: PhantomData<fn() -> E>,
}

impl<E> Clone for PersistenceCoordinator<E> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            strategy: self.strategy,
            locks: Arc::clone(&self.locks),
            entity: PhantomData,
        }
    }
}

impl<E: MappedEntity> PersistenceCoordinator<E> {
    pub fn new(
        client: Arc<dyn DatabaseClient>,
        strategy: LinkSyncStrategy,
        locks: Arc<OwnerLocks>,
    ) -> Self {
        Self {
            client,
            strategy,
            locks,
            entity: PhantomData,
        }
    }

    pub fn strategy(&self) -> LinkSyncStrategy {
        self.strategy
    }

    /// Inserts a new entity and returns it with the assigned id.
    ///
    /// # Errors
    /// - `Validation` when the entity already has an id or misses a required
    ///   field; no statement is sent in that case.
    pub async fn insert(&self, mut entity: E) -> RepoResult<E> {
        entity.normalize();
        if let Some(id) = entity.id() {
            return Err(ValidationError::IdentityAssigned {
                entity: E::ENTITY,
                id,
            }
            .into());
        }
        entity.validate()?;

        let catalog = E::catalog();
        let columns = catalog.writable_columns();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let statement = Statement::new(format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            catalog.table(),
            columns.join(", ")
        ))
        .bind_all(entity.column_values());

        let id = self.client.insert(statement).await?;
        entity.set_id(id);
        debug!(
            "event=entity_insert module=repo status=ok entity={} id={id}",
            E::ENTITY
        );
        Ok(entity)
    }

    /// Updates scalar columns keyed by id; returns the affected row count.
    ///
    /// Zero means no such row; callers translate that into `NotFound`.
    pub async fn update(&self, entity: &E) -> RepoResult<u64> {
        let id = entity
            .id()
            .ok_or(ValidationError::MissingIdentity { entity: E::ENTITY })?;
        entity.validate()?;

        let catalog = E::catalog();
        let changed = self
            .client
            .update_by_id(
                catalog.table(),
                &catalog.writable_columns(),
                entity.column_values(),
                id,
            )
            .await?;
        debug!(
            "event=entity_update module=repo status=ok entity={} id={id} changed={changed}",
            E::ENTITY
        );
        Ok(changed)
    }

    /// Updates an existing entity; zero affected rows is `NotFound`.
    pub async fn update_existing(&self, mut entity: E) -> RepoResult<E> {
        entity.normalize();
        if self.update(&entity).await? == 0 {
            return Err(RepoError::NotFound {
                entity: E::ENTITY,
                id: entity.id().unwrap_or_default(),
            });
        }
        Ok(entity)
    }

    /// Inserts or updates, then rewrites the owned link set if any.
    pub async fn save(&self, entity: E) -> RepoResult<E> {
        let Some((link, desired)) = entity.owned_link() else {
            return match entity.id() {
                None => self.insert(entity).await,
                Some(_) => self.update_existing(entity).await,
            };
        };

        let (entity, _owner) = match entity.id() {
            None => {
                let entity = self.insert(entity).await?;
                let id = owner_id_of(&entity)?;
                (entity, self.locks.lock(link.table, id).await)
            }
            Some(id) => {
                let owner = self.locks.lock(link.table, id).await;
                (self.update_existing(entity).await?, owner)
            }
        };
        self.replace_links(&link, owner_id_of(&entity)?, &desired)
            .await?;
        Ok(entity)
    }

    /// Replaces every link row of `owner_id` with one row per desired id.
    ///
    /// # Errors
    /// - `PartialLinkSync` (full-replace only) when the delete phase succeeded
    ///   and the insert phase failed; the owner is left with zero links.
    /// - Under `Transactional`, any failure rolls back to the previous set and
    ///   surfaces as the classified store error.
    pub async fn sync_link_table(
        &self,
        link: &LinkTable,
        owner_id: i64,
        desired: &BTreeSet<i64>,
    ) -> RepoResult<()> {
        let _owner = self.locks.lock(link.table, owner_id).await;
        self.replace_links(link, owner_id, desired).await
    }

    /// Link rewrite body; the caller holds the owner lock.
    async fn replace_links(
        &self,
        link: &LinkTable,
        owner_id: i64,
        desired: &BTreeSet<i64>,
    ) -> RepoResult<()> {
        debug!(
            "event=link_sync module=repo status=start table={} owner_id={owner_id} desired={} strategy={:?}",
            link.table,
            desired.len(),
            self.strategy
        );

        let insert = link_insert_statement(link, owner_id, desired);
        match self.strategy {
            LinkSyncStrategy::FullReplace => {
                self.client
                    .delete_where(link.table, link.owner_column, Value::Integer(owner_id))
                    .await?;
                if let Some(insert) = insert {
                    if let Err(source) = self.client.execute(insert).await {
                        if source.is_foreign_key_violation()
                            && !self.owner_exists(link, owner_id).await?
                        {
                            return Err(RepoError::NotFound {
                                entity: E::ENTITY,
                                id: owner_id,
                            });
                        }
                        warn!(
                            "event=link_sync module=repo status=partial table={} owner_id={owner_id} error={source}",
                            link.table
                        );
                        return Err(RepoError::PartialLinkSync {
                            link_table: link.table,
                            owner_id,
                            desired: desired.len(),
                            source,
                        });
                    }
                }
            }
            LinkSyncStrategy::Transactional => {
                let delete = Statement::new(format!(
                    "DELETE FROM {} WHERE {} = ?",
                    link.table, link.owner_column
                ))
                .bind(owner_id);
                let mut statements = vec![delete];
                statements.extend(insert);
                self.client.transaction(statements).await?;
            }
        }

        debug!(
            "event=link_sync module=repo status=ok table={} owner_id={owner_id}",
            link.table
        );
        Ok(())
    }

    /// Deletes link rows referencing `id`, then the entity row itself.
    pub async fn delete_by_id(&self, id: i64) -> RepoResult<()> {
        let mut owner_guards = Vec::new();
        for reference in E::referencing_links() {
            if reference.column == reference.link.owner_column {
                owner_guards.push(self.locks.lock(reference.link.table, id).await);
            }
            self.client
                .delete_where(reference.link.table, reference.column, Value::Integer(id))
                .await?;
        }

        let changed = self
            .client
            .delete_where(E::catalog().table(), "id", Value::Integer(id))
            .await?;
        drop(owner_guards);

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: E::ENTITY,
                id,
            });
        }
        debug!(
            "event=entity_delete module=repo status=ok entity={} id={id}",
            E::ENTITY
        );
        Ok(())
    }

    async fn owner_exists(&self, link: &LinkTable, owner_id: i64) -> RepoResult<bool> {
        let statement = Statement::new(format!(
            "SELECT id FROM {} WHERE id = ?",
            link.owner_table
        ))
        .bind(owner_id);
        Ok(self.client.fetch(statement).try_next().await?.is_some())
    }

    /// Reads the related ids currently linked to `owner_id`.
    pub async fn find_related_ids(
        &self,
        link: &LinkTable,
        owner_id: i64,
    ) -> RepoResult<BTreeSet<i64>> {
        let statement = Statement::new(format!(
            "SELECT {related} AS related_id FROM {table} WHERE {owner} = ? ORDER BY {related}",
            related = link.related_column,
            table = link.table,
            owner = link.owner_column,
        ))
        .bind(owner_id);

        let mut rows = self.client.fetch(statement);
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.try_next().await? {
            ids.insert(row.get::<i64>("related_id")?);
        }
        Ok(ids)
    }

    /// Fails with `ReferentialInconsistency` when link rows name a missing owner.
    pub async fn verify_link_integrity(&self, link: &LinkTable) -> RepoResult<()> {
        let statement = Statement::new(format!(
            "SELECT DISTINCT l.{owner} AS owner_id
             FROM {table} l
             LEFT OUTER JOIN {owner_table} o ON o.id = l.{owner}
             WHERE o.id IS NULL
             ORDER BY owner_id",
            owner = link.owner_column,
            table = link.table,
            owner_table = link.owner_table,
        ));

        let orphans: Vec<i64> = self
            .client
            .fetch(statement)
            .map_err(RepoError::from)
            .and_then(|row| async move { row.get::<i64>("owner_id").map_err(RepoError::from) })
            .try_collect()
            .await?;

        if orphans.is_empty() {
            return Ok(());
        }
        warn!(
            "event=link_audit module=repo status=error table={} orphans={}",
            link.table,
            orphans.len()
        );
        Err(RepoError::ReferentialInconsistency(format!(
            "{} rows reference missing {} ids {orphans:?}",
            link.table, link.owner_table
        )))
    }
}

fn owner_id_of<E: MappedEntity>(entity: &E) -> RepoResult<i64> {
    entity
        .id()
        .ok_or_else(|| ValidationError::MissingIdentity { entity: E::ENTITY }.into())
}

fn link_insert_statement(
    link: &LinkTable,
    owner_id: i64,
    desired: &BTreeSet<i64>,
) -> Option<Statement> {
    if desired.is_empty() {
        return None;
    }
    let rows = vec!["(?, ?)"; desired.len()].join(", ");
    let values = desired
        .iter()
        .flat_map(|related_id| [Value::Integer(owner_id), Value::Integer(*related_id)]);
    Some(
        Statement::new(format!(
            "INSERT INTO {} ({}, {}) VALUES {rows}",
            link.table, link.owner_column, link.related_column
        ))
        .bind_all(values),
    )
}

#[cfg(test)]
mod tests {
    use super::{link_insert_statement, OwnerLocks};
    use crate::repo::catalog::POST_TAG_LINK;
    use rusqlite::types::Value;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[test]
    fn link_insert_binds_one_pair_per_related_id() {
        let desired: BTreeSet<i64> = [2, 1].into_iter().collect();
        let statement = link_insert_statement(&POST_TAG_LINK, 9, &desired).unwrap();
        assert_eq!(
            statement.sql(),
            "INSERT INTO rel_post__tag (post_id, tag_id) VALUES (?, ?), (?, ?)"
        );
        assert_eq!(
            statement.params(),
            &[
                Value::Integer(9),
                Value::Integer(1),
                Value::Integer(9),
                Value::Integer(2),
            ]
        );
        assert!(link_insert_statement(&POST_TAG_LINK, 9, &BTreeSet::new()).is_none());
    }

    #[tokio::test]
    async fn owner_locks_serialize_same_owner_and_clean_up() {
        let locks = Arc::new(OwnerLocks::default());
        let first = locks.lock("rel_post__tag", 1).await;
        assert_eq!(locks.active(), 1);

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock("rel_post__tag", 1).await;
            })
        };
        let other_owner = locks.lock("rel_post__tag", 2).await;
        assert_eq!(locks.active(), 2);
        drop(other_owner);

        tokio::task::yield_now().await;
        assert!(!contender.is_finished());
        drop(first);
        contender.await.unwrap();
        assert_eq!(locks.active(), 0);
    }
}
