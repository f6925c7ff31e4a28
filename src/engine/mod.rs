// src/engine/mod.rs

//! Execution engine.
//!
//! An [`ExecutionContext`] is one run: it owns a result store and an
//! in-flight map, resolves a requested task together with everything
//! upstream of it, and keeps exactly one [`RawResult`] per task id for its
//! own lifetime. Nothing is shared between contexts, so the same tasks can
//! be run again from scratch with a fresh context.
//!
//! - [`ledger`] holds the result store and in-flight bookkeeping.
//! - `resolve` contains the per-task resolution algorithm.
//! - [`result`] defines the stored and typed result records.
//! - [`runtime`] drives a run to completion from synchronous code.

pub mod ledger;
mod resolve;
pub mod result;
pub mod runtime;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::config::RuntimeSection;
use crate::engine::ledger::Ledger;
use crate::errors::{DagError, Result};
use crate::task::{AnyTask, Dynamic, Task, TaskId, TaskNode};
use crate::trigger::State;

pub use result::{RawResult, TaskResult};

/// Process-wide unique run identifier.
pub type RunId = u64;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// State shared by every resolution belonging to one run.
#[derive(Debug)]
pub(crate) struct RunShared {
    pub(crate) run_id: RunId,
    pub(crate) input: Option<Dynamic>,
    ledger: Mutex<Ledger>,
}

impl RunShared {
    /// Lock the ledger. Never hold the guard across an `.await`.
    pub(crate) fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One run of a task graph.
///
/// Cloning yields another handle to the same run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    shared: Arc<RunShared>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionContext {
    /// Start a new run without a run input.
    pub fn new() -> Self {
        Self::with_optional_input(None)
    }

    /// Start a new run whose tasks may read `input` through
    /// [`Input::run_input`](crate::task::Input::run_input).
    pub fn with_input<I: Send + Sync + 'static>(input: I) -> Self {
        Self::with_optional_input(Some(Arc::new(input)))
    }

    fn with_optional_input(input: Option<Dynamic>) -> Self {
        let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            shared: Arc::new(RunShared {
                run_id,
                input,
                ledger: Mutex::new(Ledger::default()),
            }),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.shared.run_id
    }

    /// Resolve `task` and everything it depends on, then return its result.
    ///
    /// Tasks already resolved in this run are not executed again. The task
    /// graph must be acyclic; see [`Dag::validate`](crate::dag::Dag::validate).
    pub async fn execute<T: Send + Sync + 'static>(&self, task: &Task<T>) -> Result<TaskResult<T>> {
        let raw = self.resolve_node(&task.node).await;
        typed_result(task.id(), &raw)
    }

    /// Type-erased variant of [`ExecutionContext::execute`].
    pub async fn execute_any(&self, task: &AnyTask) -> RawResult {
        self.resolve_node(&task.node).await
    }

    /// Resolve all `tasks` concurrently and wait for every one of them.
    pub async fn execute_all(&self, tasks: &[AnyTask]) -> Vec<(TaskId, State)> {
        let handles: Vec<_> = tasks
            .iter()
            .map(|task| {
                let future = resolve::resolve(Arc::clone(&self.shared), Arc::clone(&task.node));
                (task.id().to_string(), tokio::spawn(future))
            })
            .collect();

        let mut states = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            let state = match handle.await {
                Ok(result) => result.state(),
                Err(_) => self.state_of(&id),
            };
            states.push((id, state));
        }
        states
    }

    /// Blocking variant of [`ExecutionContext::execute`]: builds a tokio
    /// runtime from `runtime` and drives the run to completion on it.
    ///
    /// Must not be called from within an async context.
    pub fn execute_blocking<T: Send + Sync + 'static>(
        &self,
        task: &Task<T>,
        runtime: &RuntimeSection,
    ) -> Result<TaskResult<T>> {
        runtime::block_on_run(self, task, runtime)
    }

    async fn resolve_node(&self, node: &Arc<TaskNode>) -> RawResult {
        info!(run_id = self.shared.run_id, task = %node.id, "resolving task");
        let result = resolve::resolve(Arc::clone(&self.shared), Arc::clone(node)).await;
        info!(
            run_id = self.shared.run_id,
            task = %node.id,
            state = %result.state(),
            "task resolved"
        );
        result
    }

    /// The stored result of `task` in this run.
    ///
    /// Fails with [`DagError::ResultNotFound`] if the task was not resolved
    /// (yet) in this run.
    pub fn get_result<T: Send + Sync + 'static>(&self, task: &Task<T>) -> Result<TaskResult<T>> {
        let raw = self.get_raw(task.id())?;
        typed_result(task.id(), &raw)
    }

    /// The stored, type-erased result for a task id.
    pub fn get_raw(&self, id: &str) -> Result<RawResult> {
        self.shared
            .ledger()
            .get(id)
            .cloned()
            .ok_or_else(|| DagError::ResultNotFound {
                task: id.to_string(),
                run_id: self.shared.run_id,
            })
    }

    /// `Created` if never requested, `Waiting`/`Running` while in flight,
    /// else the stored terminal state.
    pub fn state_of(&self, id: &str) -> State {
        self.shared.ledger().state_of(id)
    }

    pub fn is_resolved(&self, id: &str) -> bool {
        self.shared.ledger().get(id).is_some()
    }

    /// Terminal states of every task resolved so far, sorted by id.
    pub fn results(&self) -> Vec<(TaskId, State)> {
        self.shared.ledger().snapshot()
    }

    /// Every `Failed` task with its captured error, sorted by id.
    pub fn failures(&self) -> Vec<(TaskId, crate::errors::TaskFailure)> {
        let ledger = self.shared.ledger();
        let mut failures: Vec<_> = ledger
            .results()
            .filter(|(_, result)| result.state() == State::Failed)
            .filter_map(|(id, result)| result.error().map(|err| (id.clone(), Arc::clone(err))))
            .collect();
        failures.sort_by(|a, b| a.0.cmp(&b.0));
        failures
    }

    /// Number of tasks currently being resolved.
    pub fn in_flight(&self) -> usize {
        self.shared.ledger().in_flight_len()
    }
}

fn typed_result<T: Send + Sync + 'static>(id: &str, raw: &RawResult) -> Result<TaskResult<T>> {
    TaskResult::from_raw(raw).ok_or_else(|| DagError::TypeMismatch {
        task: id.to_string(),
        expected: TaskResult::<T>::expected_type(),
    })
}
