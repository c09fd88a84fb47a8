//! Model-specific error types.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Entity names are the primary identifier and must be unique graph-wide.
    #[error("Duplicate entity name: {name}")]
    DuplicateName { name: String },

    /// A name lookup failed after the linking pass should have resolved it.
    #[error("Unknown entity: {name}")]
    UnknownEntity { name: String },

    /// A handle did not point into the arena.
    #[error("Invalid entity handle: index {index}, arena length {len}")]
    InvalidHandle { index: usize, len: usize },

    /// The entity at the handle was not of the expected variant.
    #[error("Entity {name} is not a {expected}")]
    WrongVariant {
        name: String,
        expected: &'static str,
    },
}
