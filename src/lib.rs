// src/lib.rs

//! Lazily evaluated task graphs.
//!
//! Tasks are declared with [`Task::builder`], wired together through named
//! inputs, ordering links and skip gates, and resolved on demand by an
//! [`ExecutionContext`]: requesting one task runs exactly the part of the
//! graph it needs, each task at most once per run, with independent
//! branches running concurrently on tokio.
//!
//! ```ignore
//! let base = Task::builder("base").run(|_| async { Ok(1) });
//! let next = Task::builder("next")
//!     .input("x", &base)
//!     .run(|inputs| async move { Ok(inputs.cloned::<i32>("x")? + 1) });
//!
//! let ctx = ExecutionContext::new();
//! let result = ctx.execute(&next).await?;
//! assert_eq!(result.value(), Some(&2));
//! ```

pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod logging;
pub mod task;
pub mod trigger;
pub mod types;

pub use config::{EngineConfig, RuntimeSection};
pub use dag::{Dag, DagRun};
pub use engine::{ExecutionContext, RawResult, RunId, TaskResult};
pub use errors::{DagError, InputError, Result, TaskFailure};
pub use task::{AnyTask, Input, Inputs, SkipGate, Task, TaskBuilder, TaskId, Transform};
pub use trigger::{State, TriggerRule};
pub use types::{LogLevel, RuntimeFlavor};
