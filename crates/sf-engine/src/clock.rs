//! The simulation clock: run/pause/step state machine and the two-phase
//! per-step update.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Mutex, MutexGuard, PoisonError};

use sf_core::EntityId;
use sf_eval::Evaluate;
use sf_input::{OverrideBatch, OverrideStream};
use sf_model::{EntityKind, ModelGraph};
use sf_results::RowSink;

use crate::compile::CompiledSystem;
use crate::error::{EngineError, EngineResult};

/// Behavior state of the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    /// Initial state; the run has not started.
    Stopped,
    /// Stepping as fast as possible until paused or complete.
    Running,
    /// Not stepping, but accepting manual step requests.
    Paused,
    /// The declared step count has been reached. Terminal.
    Completed,
}

impl ControlState {
    pub fn name(self) -> &'static str {
        match self {
            ControlState::Stopped => "stopped",
            ControlState::Running => "running",
            ControlState::Paused => "paused",
            ControlState::Completed => "completed",
        }
    }
}

/// The externally observable pair: behavior state and step counter.
///
/// Held under one lock so an observer never sees a torn transition.
#[derive(Debug, Clone, Copy)]
pub struct ClockSnapshot {
    pub state: ControlState,
    pub step: u64,
}

/// Published on the event channel after each completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    StepCompleted { step: u64 },
    RunCompleted { steps: u64 },
}

/// Everything one step touches, locked together for the step's duration so
/// pausing is cooperative: it only prevents the next step from starting.
struct StepCore {
    graph: ModelGraph,
    /// Fixed traversal order (graph insertion order).
    order: Vec<EntityId>,
    evaluator: Box<dyn Evaluate + Send>,
    overrides: Option<OverrideStream>,
    sink: Box<dyn RowSink + Send>,
}

/// Drives a compiled system through its declared number of steps.
///
/// `run` is the worker-thread entry point; `pause`, `step`, and `snapshot`
/// may be called concurrently from other threads.
pub struct Clock {
    max_steps: u64,
    snapshot: Mutex<ClockSnapshot>,
    core: Mutex<StepCore>,
    events: Mutex<Option<Sender<ClockEvent>>>,
}

impl Clock {
    /// Build a clock over a compiled system. Writes the column header (the
    /// traversal-order entity names) to the sink immediately.
    pub fn new(
        system: CompiledSystem,
        evaluator: Box<dyn Evaluate + Send>,
        mut sink: Box<dyn RowSink + Send>,
    ) -> EngineResult<Self> {
        sink.write_header(&system.graph.names())?;
        let order = system.graph.ids().collect();
        Ok(Self {
            max_steps: system.max_steps,
            snapshot: Mutex::new(ClockSnapshot {
                state: ControlState::Stopped,
                step: 0,
            }),
            core: Mutex::new(StepCore {
                graph: system.graph,
                order,
                evaluator,
                overrides: None,
                sink,
            }),
            events: Mutex::new(None),
        })
    }

    /// Attach an override stream for a data-driven run.
    pub fn attach_overrides(&self, stream: OverrideStream) {
        self.lock_core().overrides = Some(stream);
    }

    /// Subscribe to step events. Replaces any previous subscriber.
    pub fn subscribe(&self) -> Receiver<ClockEvent> {
        let (tx, rx) = channel();
        *lock_ignoring_poison(&self.events) = Some(tx);
        rx
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        *self.lock_snapshot()
    }

    /// Observe the entity graph between steps. Takes the stepping lock, so
    /// an in-flight step finishes first.
    pub fn inspect<R>(&self, f: impl FnOnce(&ModelGraph) -> R) -> R {
        f(&self.lock_core().graph)
    }

    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    /// Run until the declared step count is reached or someone pauses.
    /// Blocks the calling thread; see [`crate::ClockWorker`].
    pub fn run(&self) -> EngineResult<()> {
        {
            let mut snapshot = self.lock_snapshot();
            if snapshot.state == ControlState::Completed {
                return Ok(());
            }
            snapshot.state = ControlState::Running;
        }

        loop {
            enum Next {
                Step,
                Complete,
                Stop,
            }
            let next = {
                let mut snapshot = self.lock_snapshot();
                if snapshot.state != ControlState::Running {
                    Next::Stop
                } else if snapshot.step >= self.max_steps {
                    snapshot.state = ControlState::Completed;
                    Next::Complete
                } else {
                    Next::Step
                }
            };
            match next {
                Next::Step => self.advance()?,
                Next::Complete => {
                    self.emit(ClockEvent::RunCompleted {
                        steps: self.max_steps,
                    });
                    return Ok(());
                }
                Next::Stop => return Ok(()),
            }
        }
    }

    /// Request a pause. Takes effect at the next step boundary; an in-flight
    /// step always completes.
    pub fn pause(&self) {
        let mut snapshot = self.lock_snapshot();
        if matches!(snapshot.state, ControlState::Stopped | ControlState::Running) {
            snapshot.state = ControlState::Paused;
        }
    }

    /// Perform exactly one step. Only a paused clock accepts this; the clock
    /// transitions to `Completed` if the step reaches the declared maximum,
    /// and stays `Paused` otherwise.
    pub fn step(&self) -> EngineResult<()> {
        {
            let snapshot = self.lock_snapshot();
            if snapshot.state != ControlState::Paused {
                return Err(EngineError::InvalidState {
                    operation: "step",
                    state: snapshot.state.name(),
                });
            }
        }
        self.advance()?;
        self.complete_if_done();
        Ok(())
    }

    /// One two-phase update: overrides, backup (with row capture), compute,
    /// then row emission and counter advance.
    fn advance(&self) -> EngineResult<()> {
        let step = self.lock_snapshot().step;
        {
            let mut guard = self.lock_core();
            let core = &mut *guard;

            // Override phase: consume a pending batch for this exact step.
            if let Some(stream) = core.overrides.as_mut() {
                let pending = match stream.peek_next() {
                    Ok(Some(batch)) => batch.step == step,
                    Ok(None) => false,
                    Err(err) => {
                        tracing::warn!(step, error = %err,
                            "override stream read failed; skipping overrides for this step");
                        false
                    }
                };
                if pending {
                    if let Ok(Some(batch)) = stream.take_next() {
                        apply_overrides(&mut core.graph, &batch);
                    }
                }
            }

            // Backup phase: capture the row, then snapshot current into
            // previous. Everything computed below reads the snapshot.
            let mut row = Vec::with_capacity(core.graph.len());
            for entity in core.graph.iter_mut() {
                row.push(entity.current);
                entity.backup();
            }

            // Compute phase, in fixed traversal order.
            for &id in &core.order {
                step_entity(&mut core.graph, core.evaluator.as_ref(), id);
            }

            core.sink.write_row(step, &row)?;
        }

        let completed_step = {
            let mut snapshot = self.lock_snapshot();
            let completed = snapshot.step;
            snapshot.step += 1;
            completed
        };
        self.emit(ClockEvent::StepCompleted {
            step: completed_step,
        });
        Ok(())
    }

    /// Transition to `Completed` (and announce it) once the counter reaches
    /// the declared maximum.
    fn complete_if_done(&self) {
        let done = {
            let mut snapshot = self.lock_snapshot();
            if snapshot.step >= self.max_steps && snapshot.state != ControlState::Completed {
                snapshot.state = ControlState::Completed;
                true
            } else {
                false
            }
        };
        if done {
            self.emit(ClockEvent::RunCompleted {
                steps: self.max_steps,
            });
        }
    }

    fn emit(&self, event: ClockEvent) {
        if let Some(tx) = &*lock_ignoring_poison(&self.events) {
            // A dropped receiver is not an error; the core never depends on
            // a concrete observer.
            let _ = tx.send(event);
        }
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, ClockSnapshot> {
        lock_ignoring_poison(&self.snapshot)
    }

    fn lock_core(&self) -> MutexGuard<'_, StepCore> {
        lock_ignoring_poison(&self.core)
    }
}

/// The clock's locks guard plain data; a panicked step leaves values stale
/// but structurally intact, so poisoning is safe to ignore.
fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply one batch of overrides against current (pre-step) values. Unknown
/// names are reported and skipped.
fn apply_overrides(graph: &mut ModelGraph, batch: &OverrideBatch) {
    for entry in &batch.overrides {
        match graph.lookup(&entry.name) {
            Some(id) => {
                if let Ok(entity) = graph.get_mut(id) {
                    let next = entry.mode.apply(entity.current, entry.value);
                    entity.set_current(next);
                }
            }
            None => {
                tracing::warn!(step = batch.step, name = %entry.name,
                    "override targets an unknown entity; skipping");
            }
        }
    }
}

/// Kind-specific update for one entity. Reservoirs and source-sinks are
/// passive: their values only move as a side effect of flows.
fn step_entity(graph: &mut ModelGraph, evaluator: &dyn Evaluate, id: EntityId) {
    let Ok(entity) = graph.get(id) else {
        return;
    };
    match &entity.kind {
        EntityKind::Reservoir { .. } | EntityKind::SourceSink { .. } => {}
        EntityKind::Control(_) => {
            let value = sf_controls::evaluate_control(graph, id, evaluator);
            if let Ok(entity) = graph.get_mut(id) {
                entity.set_current(value);
            }
        }
        EntityKind::Flow(flow) => {
            let Some(links) = flow.links else {
                tracing::warn!(name = %entity.name, "flow stepped before linking; skipping");
                return;
            };
            flow_step(graph, id, links);
        }
    }
}

/// Move resources: rate from the control's previous value, clamped by the
/// flow, subtracted from the source and added to the sink — both through the
/// target's own capacity clamp, immediately. With several flows touching one
/// clamped reservoir in a step, the result depends on flow declaration
/// order; that is the contract, not an accident.
fn flow_step(graph: &mut ModelGraph, id: EntityId, links: sf_model::FlowLinks) {
    let rate = match graph.get(links.control) {
        Ok(control) => control.previous,
        Err(err) => {
            tracing::warn!(error = %err, "flow control handle is dangling; skipping");
            return;
        }
    };

    if let Ok(flow) = graph.get_mut(id) {
        flow.set_current(rate);
    }
    let amount = match graph.get(id) {
        Ok(flow) => flow.current,
        Err(_) => return,
    };

    if let Ok(source) = graph.get_mut(links.source) {
        source.subtract(amount);
    }
    if let Ok(sink) = graph.get_mut(links.sink) {
        sink.add(amount);
    }
}
