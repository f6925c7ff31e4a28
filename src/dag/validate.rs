// src/dag/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::graph::DagGraph;
use crate::errors::{DagError, Result};

/// Check that every dependency is known and the graph is acyclic.
pub fn validate_graph(graph: &DagGraph) -> Result<()> {
    validate_dependencies(graph)?;
    validate_acyclic(graph)?;
    Ok(())
}

fn validate_dependencies(graph: &DagGraph) -> Result<()> {
    for (dep, _) in graph.edges() {
        if !graph.contains(dep) {
            return Err(DagError::TaskNotFound(dep.to_string()));
        }
    }
    Ok(())
}

/// Topological order of task ids, upstream first.
pub fn topological_order(graph: &DagGraph) -> Result<Vec<String>> {
    // Edge direction: upstream -> task.
    let mut petgraph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for id in graph.tasks() {
        petgraph.add_node(id);
    }

    for (dep, id) in graph.edges() {
        petgraph.add_edge(dep, id, ());
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&petgraph, None) {
        Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
        Err(cycle) => Err(DagError::DagCycle(format!(
            "task '{}' depends on itself",
            cycle.node_id()
        ))),
    }
}

fn validate_acyclic(graph: &DagGraph) -> Result<()> {
    topological_order(graph).map(|_| ())
}
