//! Resolved override batch types.

use sf_project::{OverrideDef, OverrideModeDef, TimestepDef};

/// How an override combines with the entity's current (pre-step) value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideMode {
    /// Replace the value.
    Set,
    /// Add to the value.
    Add,
    /// Multiply the value.
    Scale,
}

impl OverrideMode {
    /// Compute the new value from the entity's current value.
    pub fn apply(self, base: f64, value: f64) -> f64 {
        match self {
            OverrideMode::Set => value,
            OverrideMode::Add => base + value,
            OverrideMode::Scale => base * value,
        }
    }
}

impl From<OverrideModeDef> for OverrideMode {
    fn from(def: OverrideModeDef) -> Self {
        match def {
            OverrideModeDef::ValueSet => OverrideMode::Set,
            OverrideModeDef::ValueAdd => OverrideMode::Add,
            OverrideModeDef::ValueScale => OverrideMode::Scale,
        }
    }
}

/// One value injection, targeting an entity by name.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityOverride {
    /// Secondary identifier from the document; carried but not used for
    /// matching.
    pub id: String,
    pub name: String,
    pub mode: OverrideMode,
    pub value: f64,
}

impl From<OverrideDef> for EntityOverride {
    fn from(def: OverrideDef) -> Self {
        Self {
            id: def.id,
            name: def.name,
            mode: def.mode.into(),
            value: def.value,
        }
    }
}

/// All overrides destined for one simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideBatch {
    pub step: u64,
    pub overrides: Vec<EntityOverride>,
}

impl From<TimestepDef> for OverrideBatch {
    fn from(def: TimestepDef) -> Self {
        Self {
            step: def.step_value,
            overrides: def.overrides.into_iter().map(Into::into).collect(),
        }
    }
}
