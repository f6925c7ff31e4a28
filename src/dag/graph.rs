// src/dag/graph.rs

use std::collections::BTreeMap;

use crate::task::{AnyTask, TaskId};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Upstream tasks: resolved before this one.
    deps: Vec<TaskId>,
    /// Direct dependents: tasks that list this one upstream.
    dependents: Vec<TaskId>,
}

/// Id-keyed adjacency view of a set of tasks.
///
/// Tasks are linked by the ids of their upstream sets, so two different
/// nodes registered under one id collapse into one entry (the last one
/// wins). That is the shape in which a cycle can appear at all.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<TaskId, DagNode>,
}

impl DagGraph {
    /// Build the adjacency view of `tasks`.
    ///
    /// Upstream tasks that are not themselves in `tasks` still appear as
    /// dependencies, but have no entry of their own.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a AnyTask>) -> Self {
        let mut nodes: BTreeMap<TaskId, DagNode> = BTreeMap::new();

        // First pass: create nodes with their dependency lists.
        for task in tasks {
            let deps = task
                .upstream_tasks()
                .iter()
                .map(|up| up.id().to_string())
                .collect();
            nodes.entry(task.id().to_string()).or_default().deps = deps;
        }

        // Second pass: populate dependents based on deps.
        let edges: Vec<(TaskId, TaskId)> = nodes
            .iter()
            .flat_map(|(name, node)| node.deps.iter().map(move |dep| (dep.clone(), name.clone())))
            .collect();
        for (dep, name) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.push(name);
            }
        }

        Self { nodes }
    }

    /// All task ids, sorted.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Immediate upstream ids of a task.
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks without upstream.
    pub fn roots(&self) -> Vec<&str> {
        self.tasks()
            .filter(|id| self.dependencies_of(id).is_empty())
            .collect()
    }

    /// Tasks nothing else depends on.
    pub fn leaves(&self) -> Vec<&str> {
        self.tasks()
            .filter(|id| self.dependents_of(id).is_empty())
            .collect()
    }

    /// Every `(upstream, task)` edge.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.nodes.iter().flat_map(|(name, node)| {
            node.deps
                .iter()
                .map(move |dep| (dep.as_str(), name.as_str()))
        })
    }
}
