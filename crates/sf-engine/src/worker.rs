//! Dedicated worker thread for the clock.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::clock::Clock;
use crate::error::{EngineError, EngineResult};

/// Runs a [`Clock`] on its own thread so callers can pause, single-step, and
/// observe from outside while the run is in flight.
pub struct ClockWorker {
    clock: Arc<Clock>,
    handle: JoinHandle<EngineResult<()>>,
}

impl ClockWorker {
    /// Spawn the worker and start the run immediately.
    pub fn start(clock: Arc<Clock>) -> Self {
        let runner = Arc::clone(&clock);
        let handle = thread::spawn(move || runner.run());
        Self { clock, handle }
    }

    /// The shared clock, for pause/step/snapshot requests.
    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }

    /// Whether the run loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run loop to exit and surface its result.
    pub fn join(self) -> EngineResult<()> {
        self.handle.join().map_err(|_| EngineError::WorkerPanicked)?
    }
}
