// src/dag/run.rs

use crate::engine::{ExecutionContext, RawResult, RunId, TaskResult};
use crate::errors::{DagError, Result, TaskFailure};
use crate::task::{Task, TaskId};
use crate::trigger::State;

/// Outcome of one [`Dag`](crate::dag::Dag) run.
///
/// Wraps the run's [`ExecutionContext`], so results stay queryable (and
/// further tasks can still be executed in the same run).
#[derive(Debug, Clone)]
pub struct DagRun {
    dag_id: String,
    context: ExecutionContext,
}

impl DagRun {
    pub(crate) fn new(dag_id: String, context: ExecutionContext) -> Self {
        Self { dag_id, context }
    }

    pub fn dag_id(&self) -> &str {
        &self.dag_id
    }

    pub fn run_id(&self) -> RunId {
        self.context.run_id()
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Terminal states of every resolved task, sorted by id.
    pub fn results(&self) -> Vec<(TaskId, State)> {
        self.context.results()
    }

    pub fn get_result<T: Send + Sync + 'static>(&self, task: &Task<T>) -> Result<TaskResult<T>> {
        self.context.get_result(task)
    }

    pub fn get_raw(&self, id: &str) -> Result<RawResult> {
        self.context.get_raw(id)
    }

    pub fn state_of(&self, id: &str) -> State {
        self.context.state_of(id)
    }

    /// Tasks whose own work failed. Propagated `UpstreamFailed` states are
    /// not listed.
    pub fn failures(&self) -> Vec<(TaskId, TaskFailure)> {
        self.context.failures()
    }

    pub fn succeeded(&self) -> bool {
        self.results()
            .iter()
            .all(|(_, state)| !state.is_failed())
    }

    /// `Err(RunFailed)` naming every `Failed` task, if there is one.
    pub fn raise_any_error(&self) -> Result<()> {
        let failures = self.failures();
        if failures.is_empty() {
            return Ok(());
        }
        Err(DagError::RunFailed {
            run_id: self.run_id(),
            failures,
        })
    }
}
