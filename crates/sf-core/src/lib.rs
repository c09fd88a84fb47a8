//! sf-core: stable foundation for stockflow.
//!
//! Contains:
//! - ids (stable compact handles for graph entities)
//! - numeric (Real + float helpers + literal formatting)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use error::{SfError, SfResult};
pub use ids::*;
pub use numeric::*;
