//! Error types for control initialization.

use thiserror::Error;

pub type ControlResult<T> = Result<T, ControlError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    /// Re-entrant initialization: the control's formula ultimately references
    /// itself without a declared initial value to break the loop.
    #[error(
        "Reference cycle while initializing control '{name}'; \
         check its initial value and parameter references"
    )]
    Cycle { name: String },

    /// An initialization target was not a control entity.
    #[error("Entity '{name}' is not a control")]
    NotAControl { name: String },

    /// The graph handed back an inconsistent handle.
    #[error("Graph error: {0}")]
    Graph(#[from] sf_model::ModelError),
}
