//! Engine-level error type wrapping the backend crates.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Document validation failed: {0}")]
    Validation(#[from] sf_project::ValidationError),

    #[error("Graph error: {0}")]
    Model(#[from] sf_model::ModelError),

    #[error("Control initialization failed: {0}")]
    Controls(#[from] sf_controls::ControlError),

    #[error("Override stream error: {0}")]
    Input(#[from] sf_input::InputError),

    #[error("Result sink error: {0}")]
    Results(#[from] sf_results::ResultsError),

    #[error("Flow '{flow}' references unknown entity '{name}'")]
    UnresolvedReference { flow: String, name: String },

    #[error("Flow '{flow}' names '{name}' as its control, which is not a control")]
    NotAControl { flow: String, name: String },

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Simulation worker panicked")]
    WorkerPanicked,
}
