// src/trigger.rs

//! Task states and trigger rules.
//!
//! A [`TriggerRule`] is a pure policy: given the states of a task's
//! predecessors it decides which [`State`] the task should enter next.
//! The executor only consults it once every predecessor is terminal, but the
//! evaluator itself is total over any input.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Lifecycle state of one task within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Created,
    Waiting,
    Running,
    Skipped,
    Succeeded,
    Failed,
    UpstreamFailed,
    UpstreamSkipped,
}

impl State {
    /// Terminal states never change again within a run.
    pub fn is_terminal(self) -> bool {
        !matches!(self, State::Created | State::Waiting | State::Running)
    }

    /// `Failed` or `UpstreamFailed`.
    pub fn is_failed(self) -> bool {
        matches!(self, State::Failed | State::UpstreamFailed)
    }

    /// `Skipped` or `UpstreamSkipped`.
    pub fn is_skipped(self) -> bool {
        matches!(self, State::Skipped | State::UpstreamSkipped)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Created => "CREATED",
            State::Waiting => "WAITING",
            State::Running => "RUNNING",
            State::Skipped => "SKIPPED",
            State::Succeeded => "SUCCEEDED",
            State::Failed => "FAILED",
            State::UpstreamFailed => "UPSTREAM_FAILED",
            State::UpstreamSkipped => "UPSTREAM_SKIPPED",
        };
        f.write_str(name)
    }
}

/// Policy deciding whether a task may run given its upstream outcomes.
///
/// - `AllSuccess` (default): every predecessor succeeded. Any skip upstream
///   yields `UpstreamSkipped`, otherwise any failure yields `UpstreamFailed`.
/// - `AllFailed`: every predecessor failed. Skip/fail precedence as above.
/// - `AllDone`: every predecessor is terminal, whatever its outcome.
/// - `OneSuccess`: at least one predecessor succeeded.
/// - `OneFailed`: runs while no predecessor has failed.
/// - `NoneFailed`: no predecessor failed.
/// - `NoneSkipped`: no predecessor was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerRule {
    #[default]
    AllSuccess,
    AllFailed,
    AllDone,
    OneSuccess,
    OneFailed,
    NoneFailed,
    NoneSkipped,
}

impl TriggerRule {
    /// Decide the next state of a task from its predecessors' states.
    ///
    /// Any non-terminal predecessor yields `Waiting` regardless of the rule.
    /// A task without predecessors may always run.
    pub fn next_state(self, predecessor_states: &[State]) -> State {
        if predecessor_states.iter().any(|s| !s.is_terminal()) {
            return State::Waiting;
        }
        if predecessor_states.is_empty() {
            return State::Running;
        }

        let any_skipped = predecessor_states.iter().any(|s| s.is_skipped());
        let any_failed = predecessor_states.iter().any(|s| s.is_failed());
        let any_succeeded = predecessor_states.contains(&State::Succeeded);

        match self {
            TriggerRule::AllSuccess => {
                if predecessor_states.iter().all(|s| *s == State::Succeeded) {
                    State::Running
                } else if any_skipped {
                    State::UpstreamSkipped
                } else {
                    // Terminal, not all succeeded and nothing skipped: a failure.
                    State::UpstreamFailed
                }
            }
            TriggerRule::AllFailed => {
                if predecessor_states.iter().all(|s| s.is_failed()) {
                    State::Running
                } else if any_skipped {
                    State::UpstreamSkipped
                } else if any_failed {
                    State::UpstreamFailed
                } else {
                    // Everything succeeded; the rule can never fire.
                    State::UpstreamSkipped
                }
            }
            TriggerRule::AllDone => {
                if predecessor_states.iter().all(|s| s.is_terminal()) {
                    State::Running
                } else {
                    State::Failed
                }
            }
            TriggerRule::OneSuccess => {
                if any_succeeded {
                    State::Running
                } else if !any_failed {
                    State::UpstreamFailed
                } else {
                    State::Failed
                }
            }
            TriggerRule::OneFailed | TriggerRule::NoneFailed => {
                if any_failed {
                    State::Failed
                } else {
                    State::Running
                }
            }
            TriggerRule::NoneSkipped => {
                if any_skipped {
                    State::Failed
                } else {
                    State::Running
                }
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerRule::AllSuccess => "all_success",
            TriggerRule::AllFailed => "all_failed",
            TriggerRule::AllDone => "all_done",
            TriggerRule::OneSuccess => "one_success",
            TriggerRule::OneFailed => "one_failed",
            TriggerRule::NoneFailed => "none_failed",
            TriggerRule::NoneSkipped => "none_skipped",
        }
    }
}

impl fmt::Display for TriggerRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all_success" => Ok(TriggerRule::AllSuccess),
            "all_failed" => Ok(TriggerRule::AllFailed),
            "all_done" => Ok(TriggerRule::AllDone),
            "one_success" => Ok(TriggerRule::OneSuccess),
            "one_failed" => Ok(TriggerRule::OneFailed),
            "none_failed" => Ok(TriggerRule::NoneFailed),
            "none_skipped" => Ok(TriggerRule::NoneSkipped),
            other => Err(format!("invalid trigger rule: {other}")),
        }
    }
}
