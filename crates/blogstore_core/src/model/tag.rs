//! Tag entity.

use super::{require_text, TagId, ValidationError};
use serde::{Deserialize, Serialize};

const NAME_MIN_CHARS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Option<TagId>,
    pub name: Option<String>,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("Tag", "name", self.name.as_deref(), NAME_MIN_CHARS)
    }
}
