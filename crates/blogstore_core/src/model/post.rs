//! Post (child) entity.
//!
//! # Invariants
//! - `blog`, when set, names an existing blog by id.
//! - `tags` is the desired link set; saving rewrites the link table from it.

use super::blog::Blog;
use super::{BlogId, PostId, TagId, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Option<PostId>,
    pub title: Option<String>,
    pub content: Option<String>,
    /// Publication time, persisted with millisecond precision.
    pub date: Option<DateTime<Utc>>,
    /// Parent blog; `None` when the foreign key is NULL.
    pub blog: Option<Blog>,
    /// Ids of associated tags.
    pub tags: BTreeSet<TagId>,
}

impl Post {
    pub fn new(title: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            title: Some(title.into()),
            date: Some(date),
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_blog_id(mut self, blog_id: BlogId) -> Self {
        self.blog = Some(Blog::reference(blog_id));
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = TagId>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn blog_id(&self) -> Option<BlogId> {
        self.blog.as_ref().and_then(|blog| blog.id)
    }

    /// Validates required scalar fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.is_none() {
            return Err(ValidationError::MissingField {
                entity: "Post",
                field: "title",
            });
        }
        if self.date.is_none() {
            return Err(ValidationError::MissingField {
                entity: "Post",
                field: "date",
            });
        }
        Ok(())
    }
}
