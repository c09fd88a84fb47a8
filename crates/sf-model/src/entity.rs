//! Entity records and their variant set.

use sf_core::{EntityId, Real, clamp_to_limit};

/// The function kind of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    /// Always returns the declared initial value; never reads parameters.
    Constant,
    /// A textual formula over other entities' previous values.
    Function,
    /// Same evaluation as `Function`, but expected to reference its own
    /// past value, which the initialization protocol supports.
    Recursive,
    /// Two operands compared by an operator, selecting one of two literals.
    Conditional,
}

/// Resolved flow endpoints, filled in by the linking pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowLinks {
    pub source: EntityId,
    pub sink: EntityId,
    pub control: EntityId,
}

/// Flow state: name references before linking, handles after.
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    /// Maximum transfer rate per step; +infinity when unbounded.
    pub max_rate: Real,
    pub source_name: String,
    pub sink_name: String,
    pub control_name: String,
    /// `None` until the linking pass resolves the three names above.
    pub links: Option<FlowLinks>,
}

/// Control state: the computational node driving flows.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub kind: FunctionKind,
    /// Raw formula text; entity references are written `{name}`.
    pub formula: String,
    /// Declared or computed initial value.
    pub initial_value: Real,
    /// Ordered parameter handles, one per formula token that named an entity.
    pub params: Vec<EntityId>,
    /// Every delimiter-split formula token, in order. Used verbatim by the
    /// conditional kind: `[operand, operator, operand, if_true, if_false]`.
    pub tokens: Vec<String>,
    /// Cycle-detection flag: set while this control's init is on the stack.
    pub initializing: bool,
    /// Completion flag: initialization runs exactly once.
    pub initialized: bool,
}

/// The closed variant set. The compute phase matches exhaustively on this,
/// so a new variant cannot be added without handling it everywhere.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// Capacity-bounded accumulator. Writes above `capacity` are silently
    /// clamped.
    Reservoir { capacity: Real, unit: String },
    /// Unbounded external supply/drain; value pinned at +infinity for its
    /// entire lifetime.
    SourceSink { unit: String },
    Flow(Flow),
    Control(Control),
}

impl EntityKind {
    /// Human-readable variant tag for messages.
    pub fn tag(&self) -> &'static str {
        match self {
            EntityKind::Reservoir { .. } => "reservoir",
            EntityKind::SourceSink { .. } => "source-sink",
            EntityKind::Flow(_) => "flow",
            EntityKind::Control(_) => "control",
        }
    }
}

/// An entity in the model graph.
///
/// Every entity holds two value generations: `current` is mutated during a
/// step, `previous` is the snapshot taken at the start of the step. Formula
/// evaluation only ever reads `previous`, which makes the per-step compute
/// order irrelevant for controls.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Unique name; the primary identifier across the whole graph.
    pub name: String,
    /// Secondary identifier from the document. Not used for linking.
    pub id: String,
    pub current: Real,
    pub previous: Real,
    pub kind: EntityKind,
}

impl Entity {
    pub fn reservoir(
        name: impl Into<String>,
        id: impl Into<String>,
        capacity: Real,
        unit: impl Into<String>,
        level: Real,
    ) -> Self {
        let mut entity = Self {
            name: name.into(),
            id: id.into(),
            current: 0.0,
            previous: 0.0,
            kind: EntityKind::Reservoir {
                capacity,
                unit: unit.into(),
            },
        };
        entity.set_current(level);
        entity.previous = entity.current;
        entity
    }

    pub fn source_sink(
        name: impl Into<String>,
        id: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            current: Real::INFINITY,
            previous: Real::INFINITY,
            kind: EntityKind::SourceSink { unit: unit.into() },
        }
    }

    pub fn flow(
        name: impl Into<String>,
        id: impl Into<String>,
        max_rate: Real,
        level: Real,
        source_name: impl Into<String>,
        sink_name: impl Into<String>,
        control_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            // The declared starting level is clamped to the max rate.
            current: clamp_to_limit(level, max_rate),
            previous: 0.0,
            kind: EntityKind::Flow(Flow {
                max_rate,
                source_name: source_name.into(),
                sink_name: sink_name.into(),
                control_name: control_name.into(),
                links: None,
            }),
        }
    }

    /// Create a control. `initial_value` of `Some` marks the control as
    /// already initialized with the declared literal, skipping formula
    /// evaluation during the initialization pass.
    pub fn control(
        name: impl Into<String>,
        id: impl Into<String>,
        formula: impl Into<String>,
        kind: FunctionKind,
        initial_value: Option<Real>,
    ) -> Self {
        let value = initial_value.unwrap_or(0.0);
        Self {
            name: name.into(),
            id: id.into(),
            current: value,
            previous: value,
            kind: EntityKind::Control(Control {
                kind,
                formula: formula.into(),
                initial_value: value,
                params: Vec::new(),
                tokens: Vec::new(),
                initializing: false,
                initialized: initial_value.is_some(),
            }),
        }
    }

    /// Record the current value as the new previous value. This is the only
    /// place `previous` is ever written during stepping.
    pub fn backup(&mut self) {
        self.previous = self.current;
    }

    /// Write the current value through the variant's own clamp:
    /// reservoirs cap at capacity, flows cap at max rate, source-sinks stay
    /// pinned at +infinity, controls accept anything.
    pub fn set_current(&mut self, value: Real) {
        self.current = match &self.kind {
            EntityKind::Reservoir { capacity, .. } => clamp_to_limit(value, *capacity),
            EntityKind::SourceSink { .. } => Real::INFINITY,
            EntityKind::Flow(flow) => clamp_to_limit(value, flow.max_rate),
            EntityKind::Control(_) => value,
        };
    }

    /// Add to the current value, through the variant clamp. Flows use this
    /// to blindly push resources into their sink.
    pub fn add(&mut self, amount: Real) {
        self.set_current(self.current + amount);
    }

    /// Subtract from the current value, through the variant clamp. Flows use
    /// this to blindly pull resources out of their source.
    pub fn subtract(&mut self, amount: Real) {
        self.set_current(self.current - amount);
    }

    pub fn as_control(&self) -> Option<&Control> {
        match &self.kind {
            EntityKind::Control(control) => Some(control),
            _ => None,
        }
    }

    pub fn as_control_mut(&mut self) -> Option<&mut Control> {
        match &mut self.kind {
            EntityKind::Control(control) => Some(control),
            _ => None,
        }
    }

    pub fn as_flow(&self) -> Option<&Flow> {
        match &self.kind {
            EntityKind::Flow(flow) => Some(flow),
            _ => None,
        }
    }

    pub fn as_flow_mut(&mut self) -> Option<&mut Flow> {
        match &mut self.kind {
            EntityKind::Flow(flow) => Some(flow),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservoir_clamps_on_write() {
        let mut tank = Entity::reservoir("tank", "1.1", 100.0, "liters", 50.0);
        tank.set_current(250.0);
        assert_eq!(tank.current, 100.0);
        tank.set_current(-10.0);
        assert_eq!(tank.current, -10.0);
    }

    #[test]
    fn reservoir_initial_level_is_clamped() {
        let tank = Entity::reservoir("tank", "1.1", 10.0, "liters", 50.0);
        assert_eq!(tank.current, 10.0);
        assert_eq!(tank.previous, 10.0);
    }

    #[test]
    fn unbounded_reservoir_accepts_anything() {
        let mut tank = Entity::reservoir("tank", "1.1", f64::INFINITY, "liters", 0.0);
        tank.set_current(1e18);
        assert_eq!(tank.current, 1e18);
    }

    #[test]
    fn source_sink_stays_infinite() {
        let mut cloud = Entity::source_sink("world", "0.1", "liters");
        assert!(cloud.current.is_infinite());
        cloud.subtract(1e12);
        assert!(cloud.current.is_infinite());
        cloud.set_current(5.0);
        assert!(cloud.current.is_infinite());
        cloud.backup();
        assert!(cloud.previous.is_infinite());
    }

    #[test]
    fn flow_clamps_to_max_rate() {
        let mut flow = Entity::flow("drain", "2.1", 5.0, 9.0, "a", "b", "c");
        assert_eq!(flow.current, 5.0);
        flow.set_current(3.0);
        assert_eq!(flow.current, 3.0);
        flow.set_current(9.0);
        assert_eq!(flow.current, 5.0);
    }

    #[test]
    fn backup_snapshots_current() {
        let mut tank = Entity::reservoir("tank", "1.1", f64::INFINITY, "units", 7.0);
        tank.set_current(42.0);
        assert_eq!(tank.previous, 7.0);
        tank.backup();
        assert_eq!(tank.previous, 42.0);
    }

    #[test]
    fn declared_initial_marks_control_initialized() {
        let with = Entity::control("c", "3.1", "4", FunctionKind::Constant, Some(4.0));
        assert!(with.as_control().unwrap().initialized);
        assert_eq!(with.current, 4.0);

        let without = Entity::control("c", "3.1", "4", FunctionKind::Constant, None);
        assert!(!without.as_control().unwrap().initialized);
        assert_eq!(without.current, 0.0);
    }
}
