// src/config/model.rs

use serde::Deserialize;

use crate::types::{LogLevel, RuntimeFlavor};

/// Engine configuration as read from a TOML file.
///
/// ```toml
/// [runtime]
/// flavor = "multi_thread"
/// worker_threads = 4
/// thread_name = "dagrun-worker"
///
/// [logging]
/// level = "debug"
/// ```
///
/// All sections are optional and have reasonable defaults, so
/// `EngineConfig::default()` is a valid configuration on its own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Tokio runtime used by blocking runs, from `[runtime]`.
    #[serde(default)]
    pub runtime: RuntimeSection,

    /// Log verbosity, from `[logging]`.
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `[runtime]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSection {
    /// `"multi_thread"` (default) or `"current_thread"`.
    #[serde(default)]
    pub flavor: RuntimeFlavor,

    /// Worker thread count for the multi-thread flavor.
    ///
    /// If `None`, tokio picks one per core. Ignored for `current_thread`.
    #[serde(default)]
    pub worker_threads: Option<usize>,

    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_thread_name() -> String {
    "dagrun-worker".to_string()
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            flavor: RuntimeFlavor::default(),
            worker_threads: None,
            thread_name: default_thread_name(),
        }
    }
}

/// `[logging]` section.
///
/// Only consulted when neither an explicit level nor `DAGRUN_LOG` is set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<LogLevel>,
}
