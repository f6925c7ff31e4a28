mod common;

use common::*;
use dagrun::dag::{DagGraph, validate_graph};
use dagrun::{Dag, DagError, Input, State, Task};

#[test]
fn test_add_registers_upstream() -> TestResult {
    let one = return_value("one", 1);
    let two = add_one("two", &one);
    let three = add_one("three", &two);

    let mut dag = Dag::new("chain");
    dag.add(&three)?;

    let ids: Vec<&str> = dag.tasks().map(|t| t.id()).collect();
    assert_eq!(ids, vec!["one", "three", "two"]);
    assert!(dag.validate().is_ok());

    let graph = dag.graph();
    assert_eq!(graph.roots(), vec!["one"]);
    assert_eq!(graph.leaves(), vec!["three"]);
    assert_eq!(graph.dependents_of("one"), ["two".to_string()]);
    Ok(())
}

#[test]
fn test_adding_same_task_twice_is_noop() -> TestResult {
    let one = return_value("one", 1);
    let two = add_one("two", &one);

    let mut dag = Dag::new("twice");
    dag.add(&two)?.add(&one)?.add(&two)?;
    assert_eq!(dag.len(), 2);
    Ok(())
}

#[test]
fn test_duplicate_id_is_rejected() {
    let one = return_value("one", 1);
    let impostor = return_value("one", 2);
    let two = add_one("two", &one);

    let mut dag = Dag::new("dupes");
    assert!(dag.add(&two).is_ok());
    match dag.add(&impostor) {
        Err(DagError::DuplicateTaskId(id)) => assert_eq!(id, "one"),
        other => panic!("expected DuplicateTaskId, got {:?}", other.map(|d| d.len())),
    }
}

#[test]
fn test_cycle_through_shared_id_is_detected() {
    // Two distinct nodes share the id "b", which closes a loop once tasks
    // are linked by id.
    let b_first = return_value("b", 1);
    let a = add_one("a", &b_first);
    let b_second = add_one("b", &a);

    let graph = DagGraph::from_tasks([&b_second.erased(), &a.erased()]);
    match validate_graph(&graph) {
        Err(DagError::DagCycle(msg)) => {
            assert!(msg.contains("'a'") || msg.contains("'b'"));
        }
        other => panic!("expected DagCycle, got {other:?}"),
    }
}

#[test]
fn test_unknown_dependency_is_reported() {
    let one = return_value("one", 1);
    let two = add_one("two", &one);

    let graph = DagGraph::from_tasks([&two.erased()]);
    assert!(matches!(
        validate_graph(&graph),
        Err(DagError::TaskNotFound(id)) if id == "one"
    ));
}

#[test]
fn test_typed_lookup() -> TestResult {
    let one = return_value("one", 1);
    let mut dag = Dag::new("lookup");
    dag.add(&one)?;

    assert_eq!(dag.task::<i32>("one")?, one);
    assert!(matches!(dag.task::<String>("one"), Err(DagError::TypeMismatch { .. })));
    assert!(matches!(dag.task::<i32>("missing"), Err(DagError::TaskNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_run_resolves_every_leaf() -> TestResult {
    init_tracing();

    let calls = counter();
    let one = counting("one", 1, &calls);
    let two = add_one("two", &one);
    let other = return_value("other", "x".to_string());

    let mut dag = Dag::new("run");
    dag.add(&two)?.add(&other)?;

    let run = dag.run().await?;

    assert_eq!(run.dag_id(), "run");
    assert_eq!(run.get_result(&two)?.value(), Some(&2));
    assert_eq!(run.state_of("other"), State::Succeeded);
    assert_eq!(count(&calls), 1);
    assert!(run.succeeded());
    run.raise_any_error()?;
    Ok(())
}

#[tokio::test]
async fn test_raise_any_error_lists_failed_tasks_only() -> TestResult {
    init_tracing();

    let fail = failing::<i32>("fail", "boom");
    let broken = add_one("broken", &fail);
    let fine = return_value("fine", 1);

    let mut dag = Dag::new("errors");
    dag.add(&broken)?.add(&fine)?;

    let run = dag.run().await?;
    assert_eq!(run.state_of("broken"), State::UpstreamFailed);
    assert!(!run.succeeded());

    match run.raise_any_error() {
        Err(DagError::RunFailed { run_id, failures }) => {
            assert_eq!(run_id, run.run_id());
            let ids: Vec<&str> = failures.iter().map(|(id, _)| id.as_str()).collect();
            assert_eq!(ids, vec!["fail"]);
        }
        other => panic!("expected RunFailed, got {other:?}"),
    }

    let message = run.raise_any_error().map_err(|e| e.to_string()).err();
    assert!(message.is_some_and(|m| m.contains("boom")));
    Ok(())
}

#[tokio::test]
async fn test_run_with_input() -> TestResult {
    init_tracing();

    let scaled = add_one("scaled", Input::run_input_map(|n: &i32| n * 3));

    let mut dag = Dag::new("input");
    dag.add(&scaled)?;

    let run = dag.run_with_input(5_i32).await?;
    assert_eq!(run.get_result(&scaled)?.value(), Some(&16));
    Ok(())
}

#[tokio::test]
async fn test_run_leaves_gate_first_upstream_unresolved() -> TestResult {
    init_tracing();

    let calls = counter();
    let gate = return_bool("gate", true);
    let expensive = counting("expensive", 1, &calls);
    let gated: Task<i32> = add_one_builder("gated", &expensive)
        .skip_if(&gate)
        .check_skip_first(true)
        .run(|inputs| async move { Ok(inputs.cloned::<i32>("x")? + 1) });

    let mut dag = Dag::new("gated");
    dag.add(&gated)?;
    let run = dag.run().await?;

    assert_eq!(run.state_of("gated"), State::Skipped);
    assert_eq!(run.state_of("expensive"), State::Created);
    assert_eq!(count(&calls), 0);
    Ok(())
}

#[test]
fn test_run_blocking() -> TestResult {
    init_tracing();

    let one = return_value("one", 1);
    let two = add_one("two", &one);
    let mut dag = Dag::new("blocking");
    dag.add(&two)?;

    let run = dag.run_blocking(&Default::default())?;
    assert_eq!(run.get_result(&two)?.value(), Some(&2));
    Ok(())
}
