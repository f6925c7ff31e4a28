// src/task/input.rs

//! Named task inputs.
//!
//! At declaration time each input is bound through an [`Input<T>`]. The
//! executor turns those bindings into concrete values (the [`Inputs`] map)
//! right before invoking the work function.

use std::any::type_name;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::InputError;
use crate::task::transform::Step;
use crate::task::{Dynamic, Task, TaskId, TaskNode, Transform};

/// Maps the run input to an input value, or `None` if it has the wrong type.
pub(crate) type RunInputFn = Arc<dyn Fn(&Dynamic) -> Option<Dynamic> + Send + Sync>;

/// How a named input of type `T` gets its value.
pub enum Input<T> {
    /// A plain value, passed through unchanged.
    Value(T),
    /// The value produced by another task.
    Task(Task<T>),
    /// A lazy mapping over another task's value.
    Transform(Transform<T>),
    /// The value supplied to the run as a whole.
    RunInput(RunInput<T>),
}

impl<T: Send + Sync + 'static> Input<T> {
    /// Bind to the run input, which must be a `T`.
    pub fn run_input() -> Self {
        let map: RunInputFn = Arc::new(|input: &Dynamic| (**input).is::<T>().then(|| Arc::clone(input)));
        Input::RunInput(RunInput::new(map))
    }

    /// Bind to `f` applied to the run input, which must be an `I`.
    pub fn run_input_map<I, F>(f: F) -> Self
    where
        I: Send + Sync + 'static,
        F: Fn(&I) -> T + Send + Sync + 'static,
    {
        let map: RunInputFn = Arc::new(move |input: &Dynamic| {
            input
                .downcast_ref::<I>()
                .map(|value| Arc::new(f(value)) as Dynamic)
        });
        Input::RunInput(RunInput::new(map))
    }

    pub(crate) fn into_source(self) -> InputSource {
        match self {
            Input::Value(value) => InputSource::Value(Arc::new(value)),
            Input::Task(task) => InputSource::Task(task.node),
            Input::Transform(transform) => InputSource::Transform {
                root: transform.root,
                steps: transform.steps,
            },
            Input::RunInput(run_input) => InputSource::RunInput {
                map: run_input.map,
                expected: type_name::<T>(),
            },
        }
    }
}

impl<T> From<&Task<T>> for Input<T> {
    fn from(task: &Task<T>) -> Self {
        Input::Task(task.clone())
    }
}

impl<T> From<Transform<T>> for Input<T> {
    fn from(transform: Transform<T>) -> Self {
        Input::Transform(transform)
    }
}

impl<T> From<&Transform<T>> for Input<T> {
    fn from(transform: &Transform<T>) -> Self {
        Input::Transform(transform.clone())
    }
}

/// Binding to the run input; see [`Input::run_input`].
pub struct RunInput<T> {
    map: RunInputFn,
    _output: std::marker::PhantomData<fn() -> T>,
}

impl<T> RunInput<T> {
    fn new(map: RunInputFn) -> Self {
        Self {
            map,
            _output: std::marker::PhantomData,
        }
    }
}

/// Type-erased input binding stored on a [`TaskNode`].
#[derive(Clone)]
pub(crate) enum InputSource {
    Value(Dynamic),
    Task(Arc<TaskNode>),
    Transform {
        root: Arc<TaskNode>,
        steps: Vec<Step>,
    },
    RunInput {
        map: RunInputFn,
        expected: &'static str,
    },
}

impl InputSource {
    /// The task this input reads from, if any.
    pub(crate) fn root(&self) -> Option<&Arc<TaskNode>> {
        match self {
            InputSource::Task(node) | InputSource::Transform { root: node, .. } => Some(node),
            InputSource::Value(_) | InputSource::RunInput { .. } => None,
        }
    }

    pub(crate) fn has_fallback(&self) -> bool {
        match self {
            InputSource::Transform { steps, .. } => steps.iter().any(Step::has_fallback),
            _ => false,
        }
    }
}

/// Assembled input values handed to a work function.
#[derive(Clone, Default)]
pub struct Inputs {
    task: TaskId,
    values: HashMap<String, Dynamic>,
}

impl Inputs {
    pub(crate) fn new(task: TaskId, values: HashMap<String, Dynamic>) -> Self {
        Self { task, values }
    }

    /// Id of the task these inputs belong to.
    pub fn task_id(&self) -> &str {
        &self.task
    }

    /// Shared handle to the named input.
    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, InputError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| InputError::Missing(name.to_string()))?;

        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| InputError::WrongType {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Owned copy of the named input.
    pub fn cloned<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T, InputError> {
        self.get::<T>(name).map(|value| (*value).clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::fmt::Debug for Inputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("Inputs")
            .field("task", &self.task)
            .field("names", &names)
            .finish()
    }
}
