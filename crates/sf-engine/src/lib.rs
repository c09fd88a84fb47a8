//! sf-engine: loader/linker and simulation clock.
//!
//! `compile` turns a parsed system document into a fully linked, initialized
//! entity graph. `Clock` drives the run: each step applies any pending
//! overrides, snapshots every entity's value (backup), recomputes every
//! entity from the snapshot (compute), and emits one result row. A
//! `ClockWorker` runs the clock on a dedicated thread so a caller can pause
//! and single-step from outside.

pub mod clock;
pub mod compile;
pub mod error;
pub mod worker;

pub use clock::{Clock, ClockEvent, ClockSnapshot, ControlState};
pub use compile::{CompiledSystem, compile};
pub use error::{EngineError, EngineResult};
pub use worker::ClockWorker;
