// src/engine/resolve.rs

//! Recursive, memoized resolution of one task within a run.
//!
//! Resolution of a task proceeds as:
//! 1. return the stored result if the task is already terminal
//! 2. otherwise join the in-flight resolution, or spawn a detached one
//! 3. a static `skip = true` gate without other upstream skips immediately
//! 4. a gate marked `check_skip_first` is resolved alone; `true` skips the
//!    task without starting anything else upstream
//! 5. every remaining upstream task is resolved concurrently
//! 6. an upstream failure yields `UpstreamFailed` (unless a fallback in a
//!    transform chain covers it)
//! 7. an upstream skip yields `UpstreamSkipped`
//! 8. a late gate (`true`) or a static `skip = true` yields `Skipped`
//! 9. inputs are assembled
//! 10. the work function runs once; its outcome is stored
//!
//! Steps 6 and 7 apply to the default `AllSuccess` rule. Other trigger rules
//! hand the upstream states to [`TriggerRule::next_state`] instead.
//!
//! The graph must be acyclic: a cycle makes a task wait on its own in-flight
//! entry forever.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tracing::{debug, info, warn};

use crate::engine::RunShared;
use crate::engine::ledger::{InFlight, Lookup};
use crate::engine::result::RawResult;
use crate::errors::InputError;
use crate::task::input::InputSource;
use crate::task::transform::apply_steps;
use crate::task::{Dynamic, Inputs, SkipGate, TaskId, TaskNode};
use crate::trigger::{State, TriggerRule};

pub(crate) type ResolveFuture = Pin<Box<dyn Future<Output = RawResult> + Send>>;

/// Resolve `node` in `run`, running it at most once per run.
///
/// The first requester registers an in-flight entry and spawns a detached
/// driver for it while still holding the ledger lock. Every requester,
/// the first included, only waits on that entry, so a requester dropped by a
/// timeout or `select!` leaves the resolution running and its result stored.
pub(crate) fn resolve(run: Arc<RunShared>, node: Arc<TaskNode>) -> ResolveFuture {
    Box::pin(async move {
        let flight = match run.ledger().lookup_or_register(&node.id) {
            Lookup::Done(result) => return result,
            Lookup::Pending(flight) => flight,
            Lookup::Registered(flight) => {
                tokio::spawn(drive(
                    Arc::clone(&run),
                    Arc::clone(&node),
                    Arc::clone(&flight),
                ));
                flight
            }
        };

        flight.wait().await
    })
}

/// Evaluate `node`, store its terminal result and wake every waiter.
async fn drive(run: Arc<RunShared>, node: Arc<TaskNode>, flight: Arc<InFlight>) {
    let evaluation = {
        let run = Arc::clone(&run);
        let node = Arc::clone(&node);
        tokio::spawn(async move { evaluate(&run, &node).await })
    };

    let result = match evaluation.await {
        Ok(result) => result,
        Err(err) => {
            warn!(task = %node.id, run_id = run.run_id, error = %err, "task resolution panicked");
            RawResult::failed(anyhow!("resolution of task '{}' aborted: {err}", node.id))
        }
    };

    run.ledger().record(run.run_id, &node.id, result.clone());
    flight.finish(result);
}

async fn evaluate(run: &Arc<RunShared>, node: &Arc<TaskNode>) -> RawResult {
    run.ledger().set_live(run.run_id, &node.id, State::Waiting);
    let upstream = node.upstream();

    if matches!(node.skip, SkipGate::Static(true)) && upstream.is_empty() {
        debug!(task = %node.id, run_id = run.run_id, "static skip gate set; skipping");
        return RawResult::without_output(State::Skipped);
    }

    let mut resolved: HashMap<TaskId, RawResult> = HashMap::with_capacity(upstream.len());

    if node.needs_gate_first() {
        if let Some(gate) = node.gate_task() {
            let gate_result = resolve(Arc::clone(run), Arc::clone(gate)).await;
            if gate_result.is_truthy() {
                debug!(
                    task = %node.id,
                    gate = %gate.id,
                    run_id = run.run_id,
                    "skip gate resolved true before upstream; skipping"
                );
                return RawResult::without_output(State::Skipped);
            }
            resolved.insert(gate.id.clone(), gate_result);
        }
    }

    let fanned_out = fan_out(run, node, &upstream, &resolved).await;
    resolved.extend(fanned_out);

    let upstream_states: Vec<(&str, State)> = upstream
        .iter()
        .map(|up| {
            let state = resolved
                .get(&up.id)
                .map(RawResult::state)
                .unwrap_or(State::Created);
            (up.id.as_str(), state)
        })
        .collect();

    if let Some(result) = apply_trigger_rule(run, node, &upstream_states) {
        return result;
    }

    match &node.skip {
        SkipGate::Static(true) => {
            debug!(task = %node.id, run_id = run.run_id, "static skip gate set; skipping");
            return RawResult::without_output(State::Skipped);
        }
        SkipGate::Task {
            task,
            resolve_first: false,
        } if resolved.get(task.id()).is_some_and(RawResult::is_truthy) => {
            debug!(
                task = %node.id,
                gate = %task.id(),
                run_id = run.run_id,
                "skip gate resolved true; skipping"
            );
            return RawResult::without_output(State::Skipped);
        }
        _ => {}
    }

    run.ledger().set_live(run.run_id, &node.id, State::Running);

    let inputs = match assemble_inputs(run, node, &resolved) {
        Ok(inputs) => inputs,
        Err(err) => {
            warn!(
                task = %node.id,
                run_id = run.run_id,
                error = %format!("{err:#}"),
                "input assembly failed"
            );
            return RawResult::failed(err);
        }
    };

    execute_work(run, node, inputs).await
}

/// Resolve every upstream task not already in `done`, concurrently.
async fn fan_out(
    run: &Arc<RunShared>,
    node: &TaskNode,
    upstream: &[Arc<TaskNode>],
    done: &HashMap<TaskId, RawResult>,
) -> Vec<(TaskId, RawResult)> {
    let handles: Vec<_> = upstream
        .iter()
        .filter(|up| !done.contains_key(&up.id))
        .map(|up| {
            let handle = tokio::spawn(resolve(Arc::clone(run), Arc::clone(up)));
            (up.id.clone(), handle)
        })
        .collect();

    if !handles.is_empty() {
        debug!(
            task = %node.id,
            run_id = run.run_id,
            upstream = ?handles.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(),
            "waiting on upstream tasks"
        );
    }

    let mut results = Vec::with_capacity(handles.len());
    for (id, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => {
                warn!(task = %id, run_id = run.run_id, error = %err, "upstream resolution aborted");
                RawResult::failed(anyhow!("resolution of task '{id}' aborted: {err}"))
            }
        };
        results.push((id, result));
    }
    results
}

/// Decide from upstream outcomes whether `node` may run.
///
/// Returns the terminal result to store when it may not.
fn apply_trigger_rule(
    run: &RunShared,
    node: &TaskNode,
    upstream_states: &[(&str, State)],
) -> Option<RawResult> {
    if node.trigger_rule == TriggerRule::AllSuccess {
        let failed: Vec<&str> = upstream_states
            .iter()
            .filter(|(id, state)| state.is_failed() && !node.failure_covered(id))
            .map(|(id, _)| *id)
            .collect();
        if !failed.is_empty() {
            warn!(
                task = %node.id,
                run_id = run.run_id,
                ?failed,
                "upstream failed; not running task"
            );
            return Some(RawResult::without_output(State::UpstreamFailed));
        }

        if upstream_states.iter().any(|(_, state)| state.is_skipped()) {
            debug!(task = %node.id, run_id = run.run_id, "upstream skipped; not running task");
            return Some(RawResult::without_output(State::UpstreamSkipped));
        }

        return None;
    }

    let states: Vec<State> = upstream_states.iter().map(|(_, state)| *state).collect();
    match node.trigger_rule.next_state(&states) {
        State::Running => None,
        State::Failed => {
            warn!(
                task = %node.id,
                run_id = run.run_id,
                rule = %node.trigger_rule,
                ?states,
                "trigger rule not satisfied"
            );
            Some(RawResult::failed(anyhow!(
                "trigger rule {} not satisfied by upstream states {:?}",
                node.trigger_rule,
                states
            )))
        }
        state => {
            debug!(
                task = %node.id,
                run_id = run.run_id,
                rule = %node.trigger_rule,
                %state,
                "trigger rule decided not to run task"
            );
            Some(RawResult::without_output(state))
        }
    }
}

/// Turn the task's input bindings into concrete values.
fn assemble_inputs(
    run: &RunShared,
    node: &TaskNode,
    resolved: &HashMap<TaskId, RawResult>,
) -> anyhow::Result<Inputs> {
    let mut values: HashMap<String, Dynamic> = HashMap::with_capacity(node.inputs.len());

    for (name, source) in &node.inputs {
        let value = match source {
            InputSource::Value(value) => Arc::clone(value),
            InputSource::Task(root) => upstream_value(name, root, resolved)?,
            InputSource::Transform { root, steps } => {
                let root_value = upstream_value(name, root, resolved).map_err(anyhow::Error::from);
                apply_steps(steps, root_value)
                    .with_context(|| format!("transforming input '{name}' from task '{}'", root.id))?
            }
            InputSource::RunInput { map, expected } => run
                .input
                .as_ref()
                .and_then(|input| map(input))
                .ok_or_else(|| InputError::NoRunInput {
                    name: name.clone(),
                    expected: *expected,
                })?,
        };
        values.insert(name.clone(), value);
    }

    Ok(Inputs::new(node.id.clone(), values))
}

fn upstream_value(
    name: &str,
    root: &TaskNode,
    resolved: &HashMap<TaskId, RawResult>,
) -> Result<Dynamic, InputError> {
    let result = resolved.get(&root.id);
    result
        .and_then(RawResult::value)
        .map(Arc::clone)
        .ok_or_else(|| InputError::NoValue {
            name: name.to_string(),
            upstream: root.id.clone(),
            state: result.map(RawResult::state).unwrap_or(State::Created),
        })
}

/// Invoke the work function on its own tokio task so a panic is captured as
/// a failure of this task only.
async fn execute_work(run: &RunShared, node: &TaskNode, inputs: Inputs) -> RawResult {
    info!(task = %node.id, run_id = run.run_id, "running task");

    let work = (node.work)(inputs);
    match tokio::spawn(work).await {
        Ok(Ok(value)) => RawResult::succeeded(value),
        Ok(Err(err)) => {
            warn!(
                task = %node.id,
                run_id = run.run_id,
                error = %format!("{err:#}"),
                "task failed"
            );
            RawResult::failed(err)
        }
        Err(join_err) => {
            warn!(task = %node.id, run_id = run.run_id, error = %join_err, "task panicked");
            RawResult::failed(anyhow!("work function of task '{}' panicked: {join_err}", node.id))
        }
    }
}
