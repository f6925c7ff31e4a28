// src/task/mod.rs

//! Task declarations.
//!
//! A [`Task<T>`] is a typed, cheaply clonable handle to an immutable
//! [`TaskNode`]. Nodes are built once through a [`TaskBuilder`] and never
//! change afterwards, so the same task can be executed by any number of
//! independent runs.
//!
//! Dependencies are declared explicitly at build time:
//! - named inputs bound to another task, a [`Transform`] over one, a plain
//!   value, or the run input ([`Input`])
//! - `wait_on` ordering links
//! - an optional skip gate ([`SkipGate`])
//!
//! From those the upstream set is derived on demand; see
//! [`Task::upstream_tasks`].
//!
//! - [`input`] holds the input binding types and the assembled [`Inputs`].
//! - [`transform`] holds lazy result mappings.

pub mod input;
pub mod transform;

use std::any::{Any, TypeId, type_name};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::{DagError, Result};
use crate::trigger::TriggerRule;

pub use input::{Input, Inputs};
pub use transform::Transform;

use input::InputSource;

/// Caller-assigned task identity, unique within a run.
pub type TaskId = String;

/// Type-erased task output as stored in a run.
pub(crate) type Dynamic = Arc<dyn Any + Send + Sync>;

pub(crate) type WorkFuture = Pin<Box<dyn Future<Output = anyhow::Result<Dynamic>> + Send>>;
pub(crate) type WorkFn = Box<dyn Fn(Inputs) -> WorkFuture + Send + Sync>;

/// Condition under which a task is marked `Skipped` instead of running.
#[derive(Clone)]
pub enum SkipGate {
    /// Fixed at construction. `Static(false)` is the absent gate.
    Static(bool),
    /// Skip when `task` produces `true`.
    ///
    /// With `resolve_first`, the gate is resolved before any other upstream
    /// task is started; a `true` gate then leaves the rest of the upstream set
    /// untouched.
    Task {
        task: Task<bool>,
        resolve_first: bool,
    },
}

impl SkipGate {
    fn kind(&self) -> &'static str {
        match self {
            SkipGate::Static(_) => "static",
            SkipGate::Task { .. } => "task",
        }
    }
}

impl Default for SkipGate {
    fn default() -> Self {
        SkipGate::Static(false)
    }
}

impl fmt::Debug for SkipGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipGate::Static(skip) => f.debug_tuple("Static").field(skip).finish(),
            SkipGate::Task {
                task,
                resolve_first,
            } => f
                .debug_struct("Task")
                .field("task", &task.id())
                .field("resolve_first", resolve_first)
                .finish(),
        }
    }
}

/// Immutable, type-erased description of one unit of work.
pub(crate) struct TaskNode {
    pub(crate) id: TaskId,
    pub(crate) output_type: &'static str,
    pub(crate) output_type_id: TypeId,
    pub(crate) inputs: Vec<(String, InputSource)>,
    pub(crate) wait_on: Vec<Arc<TaskNode>>,
    pub(crate) skip: SkipGate,
    pub(crate) trigger_rule: TriggerRule,
    pub(crate) work: WorkFn,
}

impl TaskNode {
    /// Deduplicated upstream set, in declaration order: input roots, then
    /// `wait_on` links, then the skip-gate task.
    pub(crate) fn upstream(&self) -> Vec<Arc<TaskNode>> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut upstream = Vec::new();

        let input_roots = self.inputs.iter().filter_map(|(_, src)| src.root());
        let gate = match &self.skip {
            SkipGate::Task { task, .. } => Some(&task.node),
            SkipGate::Static(_) => None,
        };

        for node in input_roots.chain(self.wait_on.iter()).chain(gate) {
            if seen.insert(node.id.as_str()) {
                upstream.push(Arc::clone(node));
            }
        }

        upstream
    }

    pub(crate) fn gate_task(&self) -> Option<&Arc<TaskNode>> {
        match &self.skip {
            SkipGate::Task { task, .. } => Some(&task.node),
            SkipGate::Static(_) => None,
        }
    }

    pub(crate) fn needs_gate_first(&self) -> bool {
        matches!(
            self.skip,
            SkipGate::Task {
                resolve_first: true,
                ..
            }
        )
    }

    /// Whether a failure of `upstream_id` is absorbed by a fallback.
    ///
    /// True only when every reference this task holds to that task goes
    /// through a transform chain carrying a fallback.
    pub(crate) fn failure_covered(&self, upstream_id: &str) -> bool {
        if self.wait_on.iter().any(|n| n.id == upstream_id) {
            return false;
        }
        if self.gate_task().is_some_and(|n| n.id == upstream_id) {
            return false;
        }

        let mut referenced = false;
        for (_, src) in &self.inputs {
            if src.root().is_some_and(|n| n.id == upstream_id) {
                if !src.has_fallback() {
                    return false;
                }
                referenced = true;
            }
        }
        referenced
    }
}

impl fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("id", &self.id)
            .field("output_type", &self.output_type)
            .field(
                "inputs",
                &self.inputs.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>(),
            )
            .field(
                "wait_on",
                &self.wait_on.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
            )
            .field("skip", &self.skip)
            .field("trigger_rule", &self.trigger_rule)
            .finish_non_exhaustive()
    }
}

/// Typed handle to a task producing a `T`.
///
/// Equality and hashing go by id only.
pub struct Task<T> {
    pub(crate) node: Arc<TaskNode>,
    _output: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Task<T> {
    /// Start declaring a task with the given id.
    pub fn builder(id: impl Into<TaskId>) -> TaskBuilder<T> {
        TaskBuilder::new(id)
    }

    /// Lazily map this task's eventual value. See [`Transform`].
    pub fn transform<U, F>(&self, f: F) -> Transform<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        Transform::<T>::identity(Arc::clone(&self.node)).transform(f)
    }

    /// Like [`Task::transform`], but the mapping itself may fail.
    pub fn try_transform<U, F>(&self, f: F) -> Transform<U>
    where
        U: Send + Sync + 'static,
        F: Fn(&T) -> anyhow::Result<U> + Send + Sync + 'static,
    {
        Transform::<T>::identity(Arc::clone(&self.node)).try_transform(f)
    }

    /// This task's value, or `default` if the task fails.
    pub fn or_else(&self, default: T) -> Transform<T> {
        Transform::<T>::identity(Arc::clone(&self.node)).or_else(default)
    }
}

impl<T> Task<T> {
    pub(crate) fn from_node(node: Arc<TaskNode>) -> Self {
        Self {
            node,
            _output: PhantomData,
        }
    }

    pub fn id(&self) -> &str {
        &self.node.id
    }

    /// Type-erased view of this task.
    pub fn erased(&self) -> AnyTask {
        AnyTask {
            node: Arc::clone(&self.node),
        }
    }

    /// Deduplicated set of tasks that must be resolved before this one:
    /// tasks bound to inputs (directly or as transform roots), `wait_on`
    /// links, and the skip-gate task.
    pub fn upstream_tasks(&self) -> Vec<AnyTask> {
        self.erased().upstream_tasks()
    }

    pub fn has_skip_task(&self) -> bool {
        self.node.gate_task().is_some()
    }

    /// The static skip flag. Fails if the gate is task-valued.
    pub fn should_be_skipped(&self) -> Result<bool> {
        match &self.node.skip {
            SkipGate::Static(skip) => Ok(*skip),
            gate => Err(DagError::WrongSkipGate {
                task: self.node.id.clone(),
                accessor: "should_be_skipped",
                expected: "static",
                actual: gate.kind(),
            }),
        }
    }

    /// The gate task. Fails if the gate is static.
    pub fn skip_task(&self) -> Result<&Task<bool>> {
        match &self.node.skip {
            SkipGate::Task { task, .. } => Ok(task),
            gate => Err(DagError::WrongSkipGate {
                task: self.node.id.clone(),
                accessor: "skip_task",
                expected: "task",
                actual: gate.kind(),
            }),
        }
    }

    pub fn needs_to_run_skip_task_first(&self) -> bool {
        self.node.needs_gate_first()
    }

    pub fn skip_gate(&self) -> &SkipGate {
        &self.node.skip
    }

    pub fn trigger_rule(&self) -> TriggerRule {
        self.node.trigger_rule
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self::from_node(Arc::clone(&self.node))
    }
}

impl<T> PartialEq for Task<T> {
    fn eq(&self, other: &Self) -> bool {
        self.node.id == other.node.id
    }
}

impl<T> Eq for Task<T> {}

impl<T> Hash for Task<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.id.hash(state);
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Task").field(&self.node.id).finish()
    }
}

/// Type-erased task handle, used where tasks of different output types
/// live side by side (upstream sets, DAG registration).
#[derive(Clone)]
pub struct AnyTask {
    pub(crate) node: Arc<TaskNode>,
}

impl AnyTask {
    pub fn id(&self) -> &str {
        &self.node.id
    }

    /// Name of the Rust type this task produces.
    pub fn output_type(&self) -> &'static str {
        self.node.output_type
    }

    pub fn upstream_tasks(&self) -> Vec<AnyTask> {
        self.node
            .upstream()
            .into_iter()
            .map(|node| AnyTask { node })
            .collect()
    }

    /// Recover the typed handle, if `T` is this task's output type.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Task<T>> {
        (self.node.output_type_id == TypeId::of::<T>())
            .then(|| Task::from_node(Arc::clone(&self.node)))
    }

    /// Whether both handles point at the very same node, not only the same id.
    pub(crate) fn same_node(&self, other: &AnyTask) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }
}

impl<T> From<&Task<T>> for AnyTask {
    fn from(task: &Task<T>) -> Self {
        task.erased()
    }
}

impl PartialEq for AnyTask {
    fn eq(&self, other: &Self) -> bool {
        self.node.id == other.node.id
    }
}

impl Eq for AnyTask {}

impl Hash for AnyTask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.id.hash(state);
    }
}

impl fmt::Debug for AnyTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyTask").field(&self.node.id).finish()
    }
}

/// Builder for [`Task`]. Finish with [`TaskBuilder::run`].
///
/// ```ignore
/// let one = Task::builder("one").run(|_| async { Ok(1) });
/// let two = Task::builder("two")
///     .input("x", &one)
///     .run(|inputs| async move { Ok(inputs.cloned::<i32>("x")? + 1) });
/// ```
pub struct TaskBuilder<T> {
    id: TaskId,
    inputs: Vec<(String, InputSource)>,
    wait_on: Vec<Arc<TaskNode>>,
    skip: SkipGate,
    check_skip_first: bool,
    trigger_rule: TriggerRule,
    _output: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TaskBuilder<T> {
    fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            wait_on: Vec::new(),
            skip: SkipGate::default(),
            check_skip_first: false,
            trigger_rule: TriggerRule::default(),
            _output: PhantomData,
        }
    }

    /// Bind a named input. Accepts `&Task<I>`, `Transform<I>` or an
    /// [`Input<I>`] built explicitly.
    ///
    /// Binding the same name twice replaces the earlier binding.
    pub fn input<I>(mut self, name: impl Into<String>, input: impl Into<Input<I>>) -> Self
    where
        I: Send + Sync + 'static,
    {
        let name = name.into();
        let source = input.into().into_source();
        self.inputs.retain(|(existing, _)| *existing != name);
        self.inputs.push((name, source));
        self
    }

    /// Bind a named input to a plain value.
    pub fn value<I>(self, name: impl Into<String>, value: I) -> Self
    where
        I: Send + Sync + 'static,
    {
        self.input(name, Input::Value(value))
    }

    /// Order this task after `task` without consuming its value.
    pub fn wait_on<U>(mut self, task: &Task<U>) -> Self {
        self.wait_on.push(Arc::clone(&task.node));
        self
    }

    /// Static skip gate.
    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = SkipGate::Static(skip);
        self
    }

    /// Skip this task when `gate` produces `true`.
    pub fn skip_if(mut self, gate: &Task<bool>) -> Self {
        self.skip = SkipGate::Task {
            task: gate.clone(),
            resolve_first: false,
        };
        self
    }

    /// Resolve a task-valued skip gate before the rest of the upstream set.
    /// Has no effect on a static gate.
    pub fn check_skip_first(mut self, first: bool) -> Self {
        self.check_skip_first = first;
        self
    }

    pub fn trigger_rule(mut self, rule: TriggerRule) -> Self {
        self.trigger_rule = rule;
        self
    }

    /// Finish the declaration with the task's work function.
    ///
    /// The function receives the assembled [`Inputs`] and is invoked at most
    /// once per run.
    pub fn run<F, Fut>(self, work: F) -> Task<T>
    where
        F: Fn(Inputs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let work: WorkFn = Box::new(move |inputs| {
            let fut = work(inputs);
            Box::pin(async move { fut.await.map(|value| Arc::new(value) as Dynamic) })
        });

        let skip = match self.skip {
            SkipGate::Task { task, .. } => SkipGate::Task {
                task,
                resolve_first: self.check_skip_first,
            },
            gate => gate,
        };

        Task::from_node(Arc::new(TaskNode {
            id: self.id,
            output_type: type_name::<T>(),
            output_type_id: TypeId::of::<T>(),
            inputs: self.inputs,
            wait_on: self.wait_on,
            skip,
            trigger_rule: self.trigger_rule,
            work,
        }))
    }
}
