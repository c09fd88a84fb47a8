//! Loader/linker: document to resolved entity graph.
//!
//! Three passes, in order:
//! 1. build — instantiate entities variant by variant (stocks, clouds,
//!    controls, flows) and insert them into the graph;
//! 2. link — resolve every flow's source/sink/control names to handles and
//!    tokenize every control formula, resolving entity-name tokens into the
//!    ordered parameter list;
//! 3. initialize — run control initialization, which self-resolves
//!    dependency order and rejects reference cycles.
//!
//! Every failure here is fatal: configuration errors are not recoverable
//! without a new document, so no partial graph is ever returned.

use sf_core::{EntityId, Real};
use sf_eval::Evaluate;
use sf_model::{Entity, FlowLinks, FunctionKind, ModelGraph};
use sf_project::{ControlTypeDef, SystemDoc, validate_system};

use crate::error::{EngineError, EngineResult};

/// A fully linked and initialized model, ready for the clock.
#[derive(Debug, Clone)]
pub struct CompiledSystem {
    pub graph: ModelGraph,
    pub max_steps: u64,
}

/// Build, link, and initialize a system document.
pub fn compile(doc: &SystemDoc, evaluator: &dyn Evaluate) -> EngineResult<CompiledSystem> {
    validate_system(doc)?;

    let mut graph = ModelGraph::new();

    for stock in &doc.stocks {
        let capacity = stock.max_level.unwrap_or(Real::INFINITY);
        graph.insert(Entity::reservoir(
            &stock.name,
            &stock.id,
            capacity,
            &stock.units,
            stock.cur_level as Real,
        ))?;
    }
    for cloud in &doc.clouds {
        graph.insert(Entity::source_sink(&cloud.name, &cloud.id, &cloud.units))?;
    }
    for control in &doc.controls {
        graph.insert(Entity::control(
            &control.name,
            &control.id,
            &control.function,
            function_kind(control.control_type),
            control.initialvalue,
        ))?;
    }
    for flow in &doc.flows {
        let max_rate = flow.max_capacity.unwrap_or(Real::INFINITY);
        graph.insert(Entity::flow(
            &flow.name,
            &flow.id,
            max_rate,
            flow.cur_level,
            &flow.src_id,
            &flow.sink_id,
            &flow.control_name,
        ))?;
    }

    link(&mut graph)?;
    sf_controls::initialize_all(&mut graph, evaluator)?;

    Ok(CompiledSystem {
        graph,
        max_steps: doc.time_steps,
    })
}

fn function_kind(def: ControlTypeDef) -> FunctionKind {
    match def {
        ControlTypeDef::Constant => FunctionKind::Constant,
        ControlTypeDef::Function => FunctionKind::Function,
        ControlTypeDef::Recursive => FunctionKind::Recursive,
        ControlTypeDef::Conditional => FunctionKind::Conditional,
    }
}

/// Resolve name references into handles and tokenize control formulas.
fn link(graph: &mut ModelGraph) -> EngineResult<()> {
    let ids: Vec<EntityId> = graph.ids().collect();

    for id in ids {
        let entity = graph.get(id)?;
        if let Some(flow) = entity.as_flow() {
            let flow_name = entity.name.clone();
            let source_name = flow.source_name.clone();
            let sink_name = flow.sink_name.clone();
            let control_name = flow.control_name.clone();

            let links = FlowLinks {
                source: resolve(graph, &flow_name, &source_name)?,
                sink: resolve(graph, &flow_name, &sink_name)?,
                control: resolve(graph, &flow_name, &control_name)?,
            };
            if graph.get(links.control)?.as_control().is_none() {
                return Err(EngineError::NotAControl {
                    flow: flow_name,
                    name: control_name,
                });
            }
            if let Some(flow) = graph.get_mut(id)?.as_flow_mut() {
                flow.links = Some(links);
            }
        } else if let Some(control) = entity.as_control() {
            let formula = control.formula.clone();
            let mut params = Vec::new();
            let mut tokens = Vec::new();
            for token in tokenize(&formula) {
                if let Some(target) = graph.lookup(token) {
                    params.push(target);
                }
                tokens.push(token.to_string());
            }
            if let Some(control) = graph.get_mut(id)?.as_control_mut() {
                control.params = params;
                control.tokens = tokens;
            }
        }
    }

    Ok(())
}

/// Split a formula on comma, whitespace, and brace delimiters.
fn tokenize(formula: &str) -> impl Iterator<Item = &str> {
    formula
        .split(|c: char| c == ',' || c == '{' || c == '}' || c.is_whitespace())
        .filter(|token| !token.is_empty())
}

fn resolve(graph: &ModelGraph, flow: &str, name: &str) -> EngineResult<EntityId> {
    graph
        .lookup(name)
        .ok_or_else(|| EngineError::UnresolvedReference {
            flow: flow.to_string(),
            name: name.to_string(),
        })
}
