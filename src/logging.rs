// src/logging.rs

//! Logging setup for `dagrun` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. an explicit level passed by the caller
//! 2. `DAGRUN_LOG` environment variable (e.g. "info", "debug")
//! 3. `[logging].level` from the config file
//! 4. default to `info`
//!
//! Logs are sent to STDERR so that stdout stays free for the embedding
//! program.

use anyhow::{Result, anyhow};
use tracing_subscriber::fmt;

use crate::config::EngineConfig;
use crate::types::LogLevel;

/// Environment variable consulted when no explicit level is given.
pub const LOG_ENV_VAR: &str = "DAGRUN_LOG";

/// Initialise the global logging subscriber.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    install(resolve_level(level, None))
}

/// Like [`init_logging`], falling back to `[logging].level` from `cfg`.
pub fn init_from_config(level: Option<LogLevel>, cfg: &EngineConfig) -> Result<()> {
    install(resolve_level(level, cfg.logging.level))
}

/// Apply the priority order above.
pub fn resolve_level(explicit: Option<LogLevel>, configured: Option<LogLevel>) -> tracing::Level {
    explicit
        .or_else(|| {
            std::env::var(LOG_ENV_VAR)
                .ok()
                .and_then(|s| s.parse::<LogLevel>().ok())
        })
        .or(configured)
        .unwrap_or_default()
        .into()
}

fn install(level: tracing::Level) -> Result<()> {
    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
