// src/engine/ledger.rs

//! Shared per-run bookkeeping.
//!
//! The ledger is the only mutable state shared between concurrent
//! resolutions of one run:
//! - the result store (one terminal record per task id, written once)
//! - the in-flight map (one [`InFlight`] per task id currently being
//!   resolved, filled by a detached driver task)
//! - live states for tasks that are waiting or running
//!
//! It sits behind one mutex that is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Notify, OnceCell};
use tracing::{debug, warn};

use crate::engine::result::RawResult;
use crate::engine::RunId;
use crate::task::TaskId;
use crate::trigger::State;

/// A resolution in progress, shared by every requester of one task id.
///
/// Only the driver fills it; requesters merely wait, so dropping a requester
/// never cancels the resolution.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    result: OnceCell<RawResult>,
    done: Notify,
}

impl InFlight {
    /// Publish the terminal result and wake every waiter.
    pub(crate) fn finish(&self, result: RawResult) {
        if self.result.set(result).is_err() {
            warn!("in-flight resolution finished twice; keeping the first result");
        }
        self.done.notify_waiters();
    }

    /// Wait until [`InFlight::finish`] has been called.
    pub(crate) async fn wait(&self) -> RawResult {
        loop {
            // Registered on creation, so a finish between the check and the
            // await is not missed.
            let notified = self.done.notified();
            if let Some(result) = self.result.get() {
                return result.clone();
            }
            notified.await;
        }
    }
}

/// What a caller asking for a task should do next.
pub(crate) enum Lookup {
    /// Already terminal in this run.
    Done(RawResult),
    /// Another requester started the resolution; wait on it.
    Pending(Arc<InFlight>),
    /// First request: the caller must start the driver for this entry.
    Registered(Arc<InFlight>),
}

#[derive(Debug, Default)]
pub(crate) struct Ledger {
    results: HashMap<TaskId, RawResult>,
    in_flight: HashMap<TaskId, Arc<InFlight>>,
    live: HashMap<TaskId, State>,
}

impl Ledger {
    /// Return the stored result, or the in-flight entry for `id`, creating it
    /// if this is the first request.
    pub(crate) fn lookup_or_register(&mut self, id: &str) -> Lookup {
        if let Some(result) = self.results.get(id) {
            return Lookup::Done(result.clone());
        }
        if let Some(flight) = self.in_flight.get(id) {
            return Lookup::Pending(Arc::clone(flight));
        }

        let flight = Arc::new(InFlight::default());
        self.in_flight.insert(id.to_string(), Arc::clone(&flight));
        Lookup::Registered(flight)
    }

    /// Record a non-terminal state transition.
    pub(crate) fn set_live(&mut self, run_id: RunId, id: &str, state: State) {
        let previous = self.live.insert(id.to_string(), state);
        if previous != Some(state) {
            debug!(task = %id, run_id, %state, "task moved to state");
        }
    }

    /// Store the terminal result for `id` and retire its in-flight entry.
    ///
    /// The first write wins; a second one is ignored and logged.
    pub(crate) fn record(&mut self, run_id: RunId, id: &str, result: RawResult) {
        if self.results.contains_key(id) {
            warn!(task = %id, run_id, "result already recorded; ignoring second write");
            return;
        }

        debug!(task = %id, run_id, state = %result.state(), "task moved to state");
        self.live.remove(id);
        self.in_flight.remove(id);
        self.results.insert(id.to_string(), result);
    }

    pub(crate) fn get(&self, id: &str) -> Option<&RawResult> {
        self.results.get(id)
    }

    /// Terminal state if resolved, live state if in flight, else `Created`.
    pub(crate) fn state_of(&self, id: &str) -> State {
        if let Some(result) = self.results.get(id) {
            return result.state();
        }
        self.live.get(id).copied().unwrap_or(State::Created)
    }

    /// Terminal states of every resolved task, sorted by id.
    pub(crate) fn snapshot(&self) -> Vec<(TaskId, State)> {
        let mut entries: Vec<_> = self
            .results
            .iter()
            .map(|(id, result)| (id.clone(), result.state()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub(crate) fn results(&self) -> impl Iterator<Item = (&TaskId, &RawResult)> {
        self.results.iter()
    }

    pub(crate) fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }
}
