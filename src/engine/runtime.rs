// src/engine/runtime.rs

//! Blocking entry points.
//!
//! A run is synchronous end-to-end from the caller's point of view: these
//! helpers build a tokio runtime according to the `[runtime]` config section
//! and block until the requested work is terminal.

use std::future::Future;

use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::config::RuntimeSection;
use crate::engine::{ExecutionContext, TaskResult};
use crate::errors::Result;
use crate::task::Task;
use crate::types::RuntimeFlavor;

/// Build a tokio runtime from config.
pub fn build_runtime(cfg: &RuntimeSection) -> Result<Runtime> {
    let mut builder = match cfg.flavor {
        RuntimeFlavor::CurrentThread => Builder::new_current_thread(),
        RuntimeFlavor::MultiThread => {
            let mut builder = Builder::new_multi_thread();
            if let Some(threads) = cfg.worker_threads {
                builder.worker_threads(threads);
            }
            builder
        }
    };

    let runtime = builder
        .thread_name(cfg.thread_name.clone())
        .enable_all()
        .build()?;

    debug!(
        flavor = ?cfg.flavor,
        worker_threads = ?cfg.worker_threads,
        "built tokio runtime"
    );
    Ok(runtime)
}

/// Drive `future` to completion on a runtime built from `cfg`.
pub fn block_on<F: Future>(cfg: &RuntimeSection, future: F) -> Result<F::Output> {
    let runtime = build_runtime(cfg)?;
    Ok(runtime.block_on(future))
}

/// Resolve `task` in `ctx` on a fresh runtime and return its result.
pub fn block_on_run<T: Send + Sync + 'static>(
    ctx: &ExecutionContext,
    task: &Task<T>,
    cfg: &RuntimeSection,
) -> Result<TaskResult<T>> {
    block_on(cfg, ctx.execute(task))?
}
