//! Cycle-safe control initialization.
//!
//! Depth-first three-state visitation over the handle graph: a control is
//! unvisited, `initializing` (on the recursion stack), or `initialized`.
//! Every control's parameters reach a stable initial value before the
//! control computes its own; re-entering an `initializing` control means the
//! formula references form a cycle and the whole load is rejected.

use sf_core::EntityId;
use sf_eval::Evaluate;
use sf_model::ModelGraph;

use crate::error::{ControlError, ControlResult};
use crate::eval;

/// Initialize every not-yet-initialized control in the graph.
///
/// Iteration order does not matter: the recursion resolves dependency order
/// on its own. A reference cycle anywhere fails the whole pass.
pub fn initialize_all(graph: &mut ModelGraph, evaluator: &dyn Evaluate) -> ControlResult<()> {
    let ids: Vec<EntityId> = graph.ids().collect();
    for id in ids {
        if pending_control(graph, id)? {
            init_control(graph, id, evaluator)?;
        }
    }
    Ok(())
}

/// Is the entity a control that still needs initialization?
fn pending_control(graph: &ModelGraph, id: EntityId) -> ControlResult<bool> {
    Ok(graph
        .get(id)?
        .as_control()
        .map(|control| !control.initialized)
        .unwrap_or(false))
}

fn init_control(
    graph: &mut ModelGraph,
    id: EntityId,
    evaluator: &dyn Evaluate,
) -> ControlResult<()> {
    let (needs_eval, params) = {
        let entity = graph.get_mut(id)?;
        let name = entity.name.clone();
        let Some(control) = entity.as_control_mut() else {
            return Err(ControlError::NotAControl { name });
        };
        if control.initializing {
            return Err(ControlError::Cycle { name });
        }
        control.initializing = true;
        (!control.initialized, control.params.clone())
    };

    if needs_eval {
        // Parameters first, depth-first, so this control evaluates against
        // settled values.
        for param in params {
            if pending_control(graph, param)? {
                init_control(graph, param, evaluator)?;
            }
        }

        let value = eval::evaluate_control(graph, id, evaluator);
        let entity = graph.get_mut(id)?;
        entity.set_current(value);
        entity.previous = entity.current;
        if let Some(control) = entity.as_control_mut() {
            control.initial_value = value;
        }
    }

    if let Some(control) = graph.get_mut(id)?.as_control_mut() {
        control.initialized = true;
        control.initializing = false;
    }
    Ok(())
}
