//! Function-kind dispatch and formula substitution.

use sf_core::{EntityId, Real, full_precision};
use sf_eval::Evaluate;
use sf_model::{Control, FunctionKind, ModelGraph};

/// Compute a control's next value from the graph's previous-value snapshot.
///
/// Never fails: evaluation problems are reported via `tracing::warn!` and
/// default to `0.0` for the step, leaving the simulation running.
pub fn evaluate_control(graph: &ModelGraph, id: EntityId, evaluator: &dyn Evaluate) -> Real {
    let entity = match graph.get(id) {
        Ok(entity) => entity,
        Err(err) => {
            tracing::warn!(error = %err, "control evaluation on a dangling handle");
            return 0.0;
        }
    };
    let Some(control) = entity.as_control() else {
        tracing::warn!(name = %entity.name, "control evaluation on a non-control entity");
        return 0.0;
    };

    match control.kind {
        FunctionKind::Constant => control.initial_value,
        FunctionKind::Function | FunctionKind::Recursive => {
            evaluate_formula(graph, &entity.name, control, evaluator)
        }
        FunctionKind::Conditional => {
            evaluate_conditional(graph, &entity.name, control, evaluator)
        }
    }
}

/// Substitute every `{name}` parameter reference with the parameter's
/// previous value at full precision, then hand the literal expression to the
/// evaluator.
fn evaluate_formula(
    graph: &ModelGraph,
    name: &str,
    control: &Control,
    evaluator: &dyn Evaluate,
) -> Real {
    let mut expr = control.formula.clone();
    for &param in &control.params {
        let Ok(param) = graph.get(param) else {
            continue;
        };
        expr = expr.replace(
            &format!("{{{}}}", param.name),
            &full_precision(param.previous),
        );
    }

    match evaluator.evaluate(&expr) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(control = name, error = %err, expression = %expr,
                "formula evaluation failed; defaulting to 0.0");
            0.0
        }
    }
}

/// Compare the two operand parameters' previous values with the operator
/// token, then return the parsed true- or false-branch literal.
///
/// Token layout: `[operand, operator, operand, value_if_true, value_if_false]`.
fn evaluate_conditional(
    graph: &ModelGraph,
    name: &str,
    control: &Control,
    evaluator: &dyn Evaluate,
) -> Real {
    if control.params.len() < 2 || control.tokens.len() < 5 {
        tracing::warn!(control = name,
            params = control.params.len(), tokens = control.tokens.len(),
            "conditional needs two operands and five tokens; defaulting to 0.0");
        return 0.0;
    }

    let (lhs, rhs) = match (graph.get(control.params[0]), graph.get(control.params[1])) {
        (Ok(lhs), Ok(rhs)) => (lhs.previous, rhs.previous),
        _ => {
            tracing::warn!(control = name, "conditional operand handle is dangling");
            return 0.0;
        }
    };

    let expr = format!(
        "{} {} {}",
        full_precision(lhs),
        control.tokens[1],
        full_precision(rhs)
    );
    let branch = match evaluator.evaluate(&expr) {
        Ok(flag) if flag == 1.0 => &control.tokens[3],
        Ok(flag) if flag == 0.0 => &control.tokens[4],
        Ok(flag) => {
            tracing::warn!(control = name, result = flag, expression = %expr,
                "conditional operator result is not a boolean; defaulting to 0.0");
            return 0.0;
        }
        Err(err) => {
            tracing::warn!(control = name, error = %err, expression = %expr,
                "conditional comparison failed; defaulting to 0.0");
            return 0.0;
        }
    };

    match branch.parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(control = name, literal = %branch,
                "conditional branch literal is malformed; defaulting to 0.0");
            0.0
        }
    }
}
