//! # Entity Schema Error Types
//!
//! Errors raised while validating the entity descriptor list before a run.
//! A parent name that matches no descriptor is deliberately absent from this
//! list: such relations are logged and left unlinked instead of failing.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Entity descriptor at position {index} has an empty name")]
    EmptyName { index: usize },
    #[error("Entity `{entity}` has an empty statement")]
    EmptyStatement { entity: String },
    #[error("Entity `{entity}` has an empty id field name")]
    EmptyIdField { entity: String },
    #[error("Entity `{entity}` is declared more than once")]
    DuplicateEntity { entity: String },
    #[error("Entity `{entity}` declares a parent relation with an empty parent name")]
    EmptyParentName { entity: String },
    #[error("Entity `{entity}` declares parent `{parent}` without a foreign key")]
    EmptyForeignKey { entity: String, parent: String },
    #[error("Failed to parse entity descriptors: {error}")]
    Parse { error: String },
}

impl SchemaError {
    /// Wrap a deserialization failure with the source it came from
    pub fn parse_error_with_context(error: impl Into<String>, context: impl Into<String>) -> Self {
        SchemaError::Parse {
            error: format!("{}\n  Context: {}", error.into(), context.into()),
        }
    }
}
