// src/errors.rs

//! Crate-wide error types.
//!
//! [`DagError`] covers usage errors: they are returned synchronously to the
//! caller that misused the API. Failures raised while a task runs are never
//! `DagError`s; they are captured into the task's result as
//! [`TaskFailure`] and propagated structurally through the graph.

use std::sync::Arc;

use thiserror::Error;

use crate::engine::RunId;
use crate::task::TaskId;
use crate::trigger::State;

#[derive(Error, Debug)]
pub enum DagError {
    #[error("no result for task '{task}' in run {run_id}; it was not resolved in this run")]
    ResultNotFound { task: TaskId, run_id: RunId },

    #[error("task '{task}' has a {actual} skip gate; {accessor} requires a {expected} gate")]
    WrongSkipGate {
        task: TaskId,
        accessor: &'static str,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("result of task '{task}' does not hold a value of type {expected}")]
    TypeMismatch { task: TaskId, expected: &'static str },

    #[error("two different tasks share the id '{0}'")]
    DuplicateTaskId(TaskId),

    #[error("cycle detected in task DAG: {0}")]
    DagCycle(String),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("run {run_id} failed: {}", format_failures(.failures))]
    RunFailed {
        run_id: RunId,
        failures: Vec<(TaskId, TaskFailure)>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error raised while assembling a task's inputs.
///
/// Converted into a [`TaskFailure`] and stored on the task as `Failed`.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("task has no input named '{0}'")]
    Missing(String),

    #[error("input '{name}' is not of type {expected}")]
    WrongType { name: String, expected: &'static str },

    #[error("input '{name}' depends on task '{upstream}', which ended {state} without a value")]
    NoValue {
        name: String,
        upstream: TaskId,
        state: State,
    },

    #[error("input '{name}' reads the run input, but none of type {expected} was supplied")]
    NoRunInput { name: String, expected: &'static str },
}

/// A captured work-function failure, shareable between result snapshots.
pub type TaskFailure = Arc<anyhow::Error>;

fn format_failures(failures: &[(TaskId, TaskFailure)]) -> String {
    failures
        .iter()
        .map(|(task, err)| format!("task '{task}': {err:#}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DagError>;
