//! Document schema definitions.

use serde::{Deserialize, Serialize};

/// The system document: one root element declaring the total step count and
/// every entity in the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemDoc {
    /// Total number of steps to simulate before the run completes.
    #[serde(rename = "timeSteps")]
    pub time_steps: u64,
    #[serde(default)]
    pub stocks: Vec<StockDef>,
    #[serde(default)]
    pub clouds: Vec<CloudDef>,
    #[serde(default)]
    pub controls: Vec<ControlDef>,
    #[serde(default)]
    pub flows: Vec<FlowDef>,
}

/// A capacity-bounded reservoir.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockDef {
    pub id: String,
    pub name: String,
    pub units: String,
    /// Absent means unbounded (+infinity).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_level: Option<f64>,
    /// Required initial level, applied to both current and previous value.
    pub cur_level: i64,
}

/// An unbounded external supply/drain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudDef {
    pub id: String,
    pub name: String,
    pub units: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ControlTypeDef {
    Constant,
    Function,
    Recursive,
    Conditional,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlDef {
    pub id: String,
    pub name: String,
    /// Formula text; entity references are written `{name}`.
    pub function: String,
    #[serde(rename = "type")]
    pub control_type: ControlTypeDef,
    /// When present, the control starts initialized with this literal and
    /// the initialization pass skips its formula.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialvalue: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowDef {
    pub id: String,
    pub name: String,
    /// Absent means unbounded (+infinity).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<f64>,
    /// Starting level; clamped to the max rate at load.
    #[serde(default)]
    pub cur_level: f64,
    /// Matched against entity *names*, not ids, despite the field name.
    pub src_id: String,
    pub sink_id: String,
    pub control_name: String,
}

/// The override document: step-indexed batches of value injections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverrideDoc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub timesteps: Vec<TimestepDef>,
}

/// One batch of overrides, applied when the simulation reaches `stepValue`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimestepDef {
    #[serde(rename = "stepValue")]
    pub step_value: u64,
    #[serde(default)]
    pub overrides: Vec<OverrideDef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverrideModeDef {
    /// Replace the current value.
    ValueSet,
    /// Add to the current value.
    ValueAdd,
    /// Multiply the current value.
    ValueScale,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverrideDef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub mode: OverrideModeDef,
    pub value: f64,
}
