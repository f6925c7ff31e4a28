// src/engine/result.rs

//! Result records stored per task id in a run.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::errors::TaskFailure;
use crate::task::Dynamic;
use crate::trigger::State;

/// Type-erased outcome of one task in one run.
///
/// `Succeeded` carries a value, `Failed` carries an error. Propagated and
/// skipped states carry neither: the error that caused an `UpstreamFailed`
/// lives on the upstream task's own record only.
#[derive(Clone)]
pub struct RawResult {
    state: State,
    value: Option<Dynamic>,
    error: Option<TaskFailure>,
}

impl RawResult {
    pub(crate) fn succeeded(value: Dynamic) -> Self {
        Self {
            state: State::Succeeded,
            value: Some(value),
            error: None,
        }
    }

    pub(crate) fn failed(error: anyhow::Error) -> Self {
        Self {
            state: State::Failed,
            value: None,
            error: Some(Arc::new(error)),
        }
    }

    /// `Skipped`, `UpstreamSkipped` or `UpstreamFailed`.
    pub(crate) fn without_output(state: State) -> Self {
        Self {
            state,
            value: None,
            error: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn error(&self) -> Option<&TaskFailure> {
        self.error.as_ref()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub(crate) fn value(&self) -> Option<&Dynamic> {
        self.value.as_ref()
    }

    /// The value as a `T`, if there is one of that type.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value
            .as_ref()
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
    }

    /// Whether a skip gate reading this result says "skip".
    pub(crate) fn is_truthy(&self) -> bool {
        self.state == State::Succeeded
            && self
                .value
                .as_ref()
                .and_then(|value| value.downcast_ref::<bool>())
                .copied()
                .unwrap_or(false)
    }
}

impl fmt::Debug for RawResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResult")
            .field("state", &self.state)
            .field("has_value", &self.value.is_some())
            .field("error", &self.error.as_ref().map(|e| format!("{e:#}")))
            .finish()
    }
}

/// Typed outcome of a task producing a `T`.
pub struct TaskResult<T> {
    state: State,
    value: Option<Arc<T>>,
    error: Option<TaskFailure>,
}

impl<T: Send + Sync + 'static> TaskResult<T> {
    /// `None` if the stored value is not a `T`.
    pub(crate) fn from_raw(raw: &RawResult) -> Option<Self> {
        let value = match raw.value.as_ref() {
            Some(_) => Some(raw.downcast::<T>()?),
            None => None,
        };
        Some(Self {
            state: raw.state,
            value,
            error: raw.error.clone(),
        })
    }

    pub(crate) fn expected_type() -> &'static str {
        type_name::<T>()
    }
}

impl<T> TaskResult<T> {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_deref()
    }

    /// Shared handle to the stored value; repeated lookups hand out the same
    /// allocation.
    pub fn value_arc(&self) -> Option<&Arc<T>> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&TaskFailure> {
        self.error.as_ref()
    }

    pub fn is_success(&self) -> bool {
        self.state == State::Succeeded
    }
}

impl<T> Clone for TaskResult<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state,
            value: self.value.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for TaskResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskResult")
            .field("state", &self.state)
            .field("value", &self.value)
            .field("error", &self.error.as_ref().map(|e| format!("{e:#}")))
            .finish()
    }
}
