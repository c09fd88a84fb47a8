//! sf-results: per-step result rows.
//!
//! The simulation clock emits one row per step — the step index followed by
//! every entity's pre-step current value in graph traversal order — through
//! the [`RowSink`] trait. The column header is the traversal-order entity
//! name list, written once at simulation start.

pub mod writer;

pub use writer::{CsvWriter, MemorySink, RowSink};

pub type ResultsResult<T> = Result<T, ResultsError>;

#[derive(thiserror::Error, Debug)]
pub enum ResultsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
