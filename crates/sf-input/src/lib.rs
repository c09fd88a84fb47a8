//! sf-input: streaming override reader.
//!
//! Override logs can be arbitrarily large, so the reader never materializes
//! them: an [`OverrideSource`] yields one step-indexed batch at a time and
//! [`OverrideStream`] fronts it with a small bounded cache refilled lazily.
//! Two sources exist — a whole-document source for parsed override documents
//! and a JSON-Lines source that streams batches straight off a reader.

pub mod batch;
pub mod stream;

pub use batch::{EntityOverride, OverrideBatch, OverrideMode};
pub use stream::{DocSource, JsonlSource, OverrideSource, OverrideStream};

use thiserror::Error;

pub type InputResult<T> = Result<T, InputError>;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("I/O error reading override stream: {0}")]
    Io(#[from] std::io::Error),

    /// A batch that does not match the timestep schema is fatal to the read.
    #[error("Malformed override batch at line {line}: {source}")]
    MalformedBatch {
        line: usize,
        source: serde_json::Error,
    },
}
