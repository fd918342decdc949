//! Blog (parent) entity.

use super::user::AppUser;
use super::{require_text, BlogId, UserId, ValidationError};
use serde::{Deserialize, Serialize};

const NAME_MIN_CHARS: usize = 3;
const HANDLE_MIN_CHARS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blog {
    pub id: Option<BlogId>,
    pub name: Option<String>,
    pub handle: Option<String>,
    /// Owning user; `None` when the foreign key is NULL.
    pub user: Option<AppUser>,
}

impl Blog {
    pub fn new(name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
            handle: Some(handle.into()),
            user: None,
        }
    }

    /// Id-only reference used to point a post at an existing blog.
    pub fn reference(id: BlogId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user = Some(AppUser::reference(user_id));
        self
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|user| user.id)
    }

    /// Validates required scalar fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("Blog", "name", self.name.as_deref(), NAME_MIN_CHARS)?;
        require_text("Blog", "handle", self.handle.as_deref(), HANDLE_MIN_CHARS)?;
        Ok(())
    }
}
