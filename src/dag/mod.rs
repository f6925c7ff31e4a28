// src/dag/mod.rs

//! Named collections of tasks run together.
//!
//! - [`graph`] holds an id-keyed adjacency view of registered tasks.
//! - [`validate`] checks that view for unknown ids and cycles.
//! - [`run`] holds the [`DagRun`] report.

pub mod graph;
pub mod run;
pub mod validate;

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::RuntimeSection;
use crate::engine::{ExecutionContext, runtime};
use crate::errors::{DagError, Result};
use crate::task::{AnyTask, Task, TaskId};

pub use graph::DagGraph;
pub use run::DagRun;
pub use validate::{topological_order, validate_graph};

/// A named set of tasks.
///
/// Adding a task also registers everything upstream of it.
#[derive(Debug, Clone)]
pub struct Dag {
    id: String,
    tasks: BTreeMap<TaskId, AnyTask>,
}

impl Dag {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Register `task` and every task reachable upstream of it.
    ///
    /// Fails with [`DagError::DuplicateTaskId`] if a different task is
    /// already registered under one of those ids. Re-adding the same task is
    /// a no-op.
    pub fn add(&mut self, task: impl Into<AnyTask>) -> Result<&mut Self> {
        let mut stack = vec![task.into()];

        while let Some(task) = stack.pop() {
            if let Some(existing) = self.tasks.get(task.id()) {
                if existing.same_node(&task) {
                    continue;
                }
                return Err(DagError::DuplicateTaskId(task.id().to_string()));
            }

            debug!(dag = %self.id, task = %task.id(), "registering task");
            stack.extend(task.upstream_tasks());
            self.tasks.insert(task.id().to_string(), task);
        }

        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<&AnyTask> {
        self.tasks.get(id)
    }

    /// Typed handle for a registered task.
    pub fn task<T: Send + Sync + 'static>(&self, id: &str) -> Result<Task<T>> {
        let task = self
            .get(id)
            .ok_or_else(|| DagError::TaskNotFound(id.to_string()))?;
        task.downcast::<T>().ok_or_else(|| DagError::TypeMismatch {
            task: id.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Registered tasks, sorted by id.
    pub fn tasks(&self) -> impl Iterator<Item = &AnyTask> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn graph(&self) -> DagGraph {
        DagGraph::from_tasks(self.tasks.values())
    }

    /// Check for unknown upstream ids and cycles.
    pub fn validate(&self) -> Result<()> {
        validate_graph(&self.graph())
    }

    /// Validate, then resolve every leaf task in a fresh run.
    pub async fn run(&self) -> Result<DagRun> {
        self.run_in(ExecutionContext::new()).await
    }

    /// Like [`Dag::run`], with a run input available to
    /// [`Input::run_input`](crate::task::Input::run_input) bindings.
    pub async fn run_with_input<I: Send + Sync + 'static>(&self, input: I) -> Result<DagRun> {
        self.run_in(ExecutionContext::with_input(input)).await
    }

    /// Blocking variant of [`Dag::run`] on a runtime built from `cfg`.
    pub fn run_blocking(&self, cfg: &RuntimeSection) -> Result<DagRun> {
        runtime::block_on(cfg, self.run())?
    }

    async fn run_in(&self, context: ExecutionContext) -> Result<DagRun> {
        let graph = self.graph();
        validate_graph(&graph)?;

        let leaves: Vec<AnyTask> = graph
            .leaves()
            .into_iter()
            .filter_map(|id| self.tasks.get(id).cloned())
            .collect();

        info!(
            dag = %self.id,
            run_id = context.run_id(),
            tasks = self.tasks.len(),
            leaves = leaves.len(),
            "starting dag run"
        );

        let states = context.execute_all(&leaves).await;

        info!(
            dag = %self.id,
            run_id = context.run_id(),
            ?states,
            "dag run finished"
        );

        Ok(DagRun::new(self.id.clone(), context))
    }
}
