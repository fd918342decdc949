//! Read-only owning-user reference for blogs.

use super::UserId;
use serde::{Deserialize, Serialize};

/// Account that owns a blog. Managed outside this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppUser {
    pub id: UserId,
    pub login: Option<String>,
}

impl AppUser {
    /// Id-only reference, as carried by an unjoined foreign key.
    pub fn reference(id: UserId) -> Self {
        Self { id, login: None }
    }
}
