// src/config/validate.rs

use crate::config::model::{EngineConfig, RuntimeSection};
use crate::errors::{DagError, Result};
use crate::types::RuntimeFlavor;

/// Check invariants serde cannot express.
pub fn validate_config(cfg: &EngineConfig) -> Result<()> {
    validate_runtime(&cfg.runtime)?;
    Ok(())
}

fn validate_runtime(runtime: &RuntimeSection) -> Result<()> {
    if runtime.worker_threads == Some(0) {
        return Err(DagError::ConfigError(
            "[runtime].worker_threads must be >= 1 (got 0)".to_string(),
        ));
    }

    if runtime.worker_threads.is_some() && runtime.flavor == RuntimeFlavor::CurrentThread {
        tracing::debug!("[runtime].worker_threads is ignored for the current_thread flavor");
    }

    if runtime.thread_name.trim().is_empty() {
        return Err(DagError::ConfigError(
            "[runtime].thread_name must not be empty".to_string(),
        ));
    }

    Ok(())
}
