//! sf-controls: control evaluation engine for stockflow.
//!
//! A control computes its next value from a textual formula over other
//! entities' *previous* values, so the order controls are computed in within
//! a step never matters. Four function kinds exist (constant, function,
//! recursive, conditional); all evaluation goes through the narrow
//! [`sf_eval::Evaluate`] collaborator.
//!
//! Evaluation failures are deliberately non-fatal: they are reported through
//! `tracing` and the affected control falls back to `0.0` for that step.
//! Initialization failures (reference cycles) abort the load instead.

pub mod error;
pub mod eval;
pub mod init;

pub use error::{ControlError, ControlResult};
pub use eval::evaluate_control;
pub use init::initialize_all;
