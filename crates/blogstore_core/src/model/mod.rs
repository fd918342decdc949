//! Blog domain model.
//!
//! # Responsibility
//! - Define the Blog/Post/Tag entities and the read-only AppUser reference.
//! - Own field-level validation shared by insert and update paths.
//!
//! # Invariants
//! - Entities carry no id until the store assigns one on insert.
//! - Serialized field names are stable for external mappers:
//!   Post `id,title,content,date,blog,tags`; Blog `id,name,handle,user`;
//!   Tag `id,name`.

use thiserror::Error;

pub mod blog;
pub mod post;
pub mod tag;
pub mod user;

/// Store-assigned surrogate keys.
pub type BlogId = i64;
pub type PostId = i64;
pub type TagId = i64;
pub type UserId = i64;

/// Rejected entity state, raised before any store access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{entity}.{field} is required")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },
    #[error("{entity}.{field} must be at least {min} characters")]
    TooShort {
        entity: &'static str,
        field: &'static str,
        min: usize,
    },
    #[error("{entity} already has id {id}; insert expects a new entity")]
    IdentityAssigned { entity: &'static str, id: i64 },
    #[error("{entity} has no id; update expects a persisted entity")]
    MissingIdentity { entity: &'static str },
}

/// Checks that an optional text field is present and long enough.
pub(crate) fn require_text(
    entity: &'static str,
    field: &'static str,
    value: Option<&str>,
    min: usize,
) -> Result<(), ValidationError> {
    let value = value.ok_or(ValidationError::MissingField { entity, field })?;
    if value.chars().count() < min {
        return Err(ValidationError::TooShort { entity, field, min });
    }
    Ok(())
}
