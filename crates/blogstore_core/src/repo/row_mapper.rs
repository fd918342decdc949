//! Flat-row to entity mappers.
//!
//! # Responsibility
//! - Convert one prefixed slice of a result row into one typed entity.
//!
//! # Invariants
//! - Mappers read only `{prefix}_*` columns and never touch the store.
//! - A NULL foreign key maps to an unset relation, never an error.
//! - A missing or mistyped column is a programming error surfaced as
//!   `DbError::MissingColumn` / `DbError::ColumnType`.

use super::catalog::column_alias;
use crate::db::{DbError, DbResult, Row};
use crate::model::blog::Blog;
use crate::model::post::Post;
use crate::model::tag::Tag;
use crate::model::user::AppUser;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError};
use std::collections::BTreeSet;

/// Maps the columns projected under one alias prefix.
pub trait RowMapper: Sized {
    fn map_row(row: &Row, prefix: &str) -> DbResult<Self>;
}

/// Maps a LEFT OUTER JOIN side; `None` when the joined row was absent.
pub fn map_optional<T: RowMapper>(row: &Row, prefix: &str) -> DbResult<Option<T>> {
    if row.is_null(&column_alias(prefix, "id"))? {
        return Ok(None);
    }
    T::map_row(row, prefix).map(Some)
}

struct Prefixed<'a> {
    row: &'a Row,
    prefix: &'a str,
}

impl Prefixed<'_> {
    fn get<T: FromSql>(&self, column: &str) -> DbResult<T> {
        self.row.get(&column_alias(self.prefix, column))
    }

    fn get_datetime(&self, column: &str) -> DbResult<Option<DateTime<Utc>>> {
        let alias = column_alias(self.prefix, column);
        match self.row.get::<Option<i64>>(&alias)? {
            Some(millis) => DateTime::<Utc>::from_timestamp_millis(millis)
                .map(Some)
                .ok_or(DbError::ColumnType {
                    column: alias,
                    source: FromSqlError::OutOfRange(millis),
                }),
            None => Ok(None),
        }
    }
}

/// Storage encoding for timestamps: UTC epoch milliseconds.
pub(crate) fn datetime_to_millis(value: &DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

impl RowMapper for AppUser {
    fn map_row(row: &Row, prefix: &str) -> DbResult<Self> {
        let row = Prefixed { row, prefix };
        Ok(Self {
            id: row.get("id")?,
            login: row.get("login")?,
        })
    }
}

impl RowMapper for Blog {
    fn map_row(row: &Row, prefix: &str) -> DbResult<Self> {
        let row = Prefixed { row, prefix };
        Ok(Self {
            id: Some(row.get("id")?),
            name: row.get("name")?,
            handle: row.get("handle")?,
            user: row.get::<Option<i64>>("user_id")?.map(AppUser::reference),
        })
    }
}

impl RowMapper for Post {
    fn map_row(row: &Row, prefix: &str) -> DbResult<Self> {
        let row = Prefixed { row, prefix };
        Ok(Self {
            id: Some(row.get("id")?),
            title: row.get("title")?,
            content: row.get("content")?,
            date: row.get_datetime("date")?,
            blog: row.get::<Option<i64>>("blog_id")?.map(Blog::reference),
            tags: BTreeSet::new(),
        })
    }
}

impl RowMapper for Tag {
    fn map_row(row: &Row, prefix: &str) -> DbResult<Self> {
        let row = Prefixed { row, prefix };
        Ok(Self {
            id: Some(row.get("id")?),
            name: row.get("name")?,
        })
    }
}
