// src/task/transform.rs

//! Lazy mappings over a task's eventual value.
//!
//! A [`Transform`] is not schedulable on its own: it is a root task plus an
//! ordered list of steps. Composing a transform only appends a step, so any
//! chain resolves to exactly one root, and that root is what the executor
//! runs. Once the root's result is known the steps are folded left to right.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::anyhow;

use crate::task::{AnyTask, Dynamic, TaskNode};

pub(crate) type StepFn = Arc<dyn Fn(&Dynamic) -> anyhow::Result<Dynamic> + Send + Sync>;

/// One link of a transform chain: a mapping plus an optional fallback.
///
/// The fallback replaces an error arriving from the previous link, or one
/// raised by this link's own mapping.
#[derive(Clone)]
pub(crate) struct Step {
    map: StepFn,
    fallback: Option<Dynamic>,
}

impl Step {
    pub(crate) fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    fn apply(&self, upstream: anyhow::Result<Dynamic>) -> anyhow::Result<Dynamic> {
        match upstream.and_then(|value| (self.map)(&value)) {
            Ok(value) => Ok(value),
            Err(err) => match &self.fallback {
                Some(fallback) => Ok(Arc::clone(fallback)),
                None => Err(err),
            },
        }
    }
}

/// Fold `steps` over the root task's outcome.
pub(crate) fn apply_steps(steps: &[Step], root: anyhow::Result<Dynamic>) -> anyhow::Result<Dynamic> {
    steps.iter().fold(root, |acc, step| step.apply(acc))
}

/// Deferred mapping producing a `T` from some root task's value.
pub struct Transform<T> {
    pub(crate) root: Arc<TaskNode>,
    pub(crate) steps: Vec<Step>,
    _output: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Transform<T> {
    /// Chain with no steps: the root's own value.
    pub(crate) fn identity(root: Arc<TaskNode>) -> Self {
        Self {
            root,
            steps: Vec::new(),
            _output: PhantomData,
        }
    }

    fn push<U>(&self, step: Step) -> Transform<U> {
        let mut steps = self.steps.clone();
        steps.push(step);
        Transform {
            root: Arc::clone(&self.root),
            steps,
            _output: PhantomData,
        }
    }

    /// Apply `f` after this chain: `t.transform(f).transform(g)` yields
    /// `g(f(value))`.
    pub fn transform<U, F>(&self, f: F) -> Transform<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.try_transform(move |value| Ok(f(value)))
    }

    /// Apply a fallible `f` after this chain. An error from `f` behaves like
    /// an upstream failure for the following links.
    pub fn try_transform<U, F>(&self, f: F) -> Transform<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> anyhow::Result<U> + Send + Sync + 'static,
    {
        let map: StepFn = Arc::new(move |value: &Dynamic| {
            let value = value
                .downcast_ref::<T>()
                .ok_or_else(|| anyhow!("transform expected a value of type {}", type_name::<T>()))?;
            f(value).map(|out| Arc::new(out) as Dynamic)
        });
        self.push(Step {
            map,
            fallback: None,
        })
    }

    /// Use `default` if anything before this point in the chain failed,
    /// the root task included.
    pub fn or_else(&self, default: T) -> Transform<T> {
        let map: StepFn = Arc::new(|value: &Dynamic| Ok(Arc::clone(value)));
        self.push(Step {
            map,
            fallback: Some(Arc::new(default)),
        })
    }
}

impl<T> Transform<T> {
    /// The task this chain is rooted at.
    pub fn root(&self) -> AnyTask {
        AnyTask {
            node: Arc::clone(&self.root),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn has_fallback(&self) -> bool {
        self.steps.iter().any(Step::has_fallback)
    }
}

impl<T> Clone for Transform<T> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            steps: self.steps.clone(),
            _output: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Transform<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("root", &self.root.id)
            .field("steps", &self.steps.len())
            .field("has_fallback", &self.has_fallback())
            .finish()
    }
}
