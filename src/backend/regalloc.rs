use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::backend::graph::Graph;
use crate::backend::liveness::{self, LivenessResult};
use crate::config::RegisterAllocation;
use crate::ir::cfg::CFG;
use crate::ir::{ClassUnit, Method, VarKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegAllocError {
    #[error("method '{method}' needs more than {available} register(s) besides its parameters; keeping one slot per variable")]
    Infeasible { method: String, available: usize },
}

/// Colors every method of `unit` according to `mode`, rewriting register slots in place.
///
/// Methods that cannot be colored keep their declaration-order slots; one error is
/// returned for each of them and the caller decides how to report it.
pub fn allocate(unit: &mut ClassUnit, mode: RegisterAllocation) -> Vec<RegAllocError> {
    if mode == RegisterAllocation::Off {
        return Vec::new();
    }

    let mut errors = Vec::new();
    for method in &mut unit.methods {
        if let Err(err) = allocate_method(method, mode) {
            errors.push(err);
        }
    }
    errors
}

pub fn allocate_method(method: &mut Method, mode: RegisterAllocation) -> Result<(), RegAllocError> {
    let cfg = CFG::build(method);
    let liveness = liveness::analyse(method, &cfg);
    let mut graph = interference_graph(method, &liveness);

    let start = method.first_free_register();
    let limit = match mode {
        RegisterAllocation::Bounded(k) => Some(start + k),
        _ => None,
    };

    for var in method.vars.iter() {
        let Some(id) = graph.id(&var.name) else {
            continue;
        };
        if var.kind == VarKind::Param {
            graph.set_color(id, var.register);
            continue;
        }

        let taken: HashSet<usize> = graph
            .neighbours(id)
            .filter_map(|n| graph.node(n).color)
            .collect();
        let color = (start..)
            .take_while(|c| limit.map_or(true, |limit| *c < limit))
            .find(|c| !taken.contains(c));

        match color {
            Some(color) => graph.set_color(id, color),
            None => {
                return Err(RegAllocError::Infeasible {
                    method: method.name.clone(),
                    available: limit.map_or(0, |limit| limit - start),
                });
            }
        }
    }

    let colors: Vec<(String, usize)> = method
        .vars
        .iter()
        .filter_map(|var| graph.color(&var.name).map(|color| (var.name.clone(), color)))
        .collect();
    for (name, color) in colors {
        method.vars.set_register(&name, color);
    }

    debug!(
        "Allocated '{}': {} variable(s) in {} register(s)",
        method.name,
        method.vars.len(),
        method.vars.iter().map(|v| v.register).collect::<HashSet<_>>().len()
    );
    Ok(())
}

/// Two variables interfere when both are live on entry to some node, or both are
/// live on exit from (or defined at) some node.
pub fn interference_graph(method: &Method, liveness: &LivenessResult) -> Graph<String> {
    let mut graph = Graph::new();
    for var in method.vars.iter() {
        graph.add_node(var.name.clone());
    }

    let mut connect = |names: Vec<&String>| {
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                graph.add_edge(*a, *b);
            }
        }
    };

    for node in liveness.values() {
        connect(node.live_in.iter().collect());
        connect(node.live_out.union(&node.def_set).collect());
    }

    graph
}
