mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use dagrun::{AnyTask, DagError, ExecutionContext, State, Task};

#[tokio::test]
async fn test_get_result_is_idempotent() -> TestResult {
    init_tracing();

    let words = return_value("words", vec!["a".to_string(), "b".to_string()]);

    let ctx = ExecutionContext::new();
    ctx.execute(&words).await?;

    let first = ctx.get_result(&words)?;
    let second = ctx.get_result(&words)?;

    assert_eq!(first.state(), second.state());
    assert_eq!(first.value(), second.value());
    let (a, b) = (first.value_arc().expect("value"), second.value_arc().expect("value"));
    assert!(Arc::ptr_eq(a, b));
    Ok(())
}

#[tokio::test]
async fn test_failed_result_error_is_shared() -> TestResult {
    init_tracing();

    let fail = failing::<i32>("fail", "boom");

    let ctx = ExecutionContext::new();
    ctx.execute(&fail).await?;

    let first = ctx.get_result(&fail)?;
    let second = ctx.get_result(&fail)?;
    let (a, b) = (first.error().expect("error"), second.error().expect("error"));
    assert!(Arc::ptr_eq(a, b));
    Ok(())
}

#[tokio::test]
async fn test_get_result_before_execute_is_not_found() {
    init_tracing();

    let one = return_value("one", 1);
    let ctx = ExecutionContext::new();

    assert!(matches!(
        ctx.get_result(&one),
        Err(DagError::ResultNotFound { .. })
    ));
    assert!(!ctx.is_resolved("one"));
}

#[tokio::test]
async fn test_get_result_with_wrong_type_is_mismatch() -> TestResult {
    init_tracing();

    let one = return_value("one", 1);
    let impostor = return_value("one", "not a number".to_string());

    let ctx = ExecutionContext::new();
    ctx.execute(&one).await?;

    match ctx.get_result(&impostor) {
        Err(DagError::TypeMismatch { task, expected }) => {
            assert_eq!(task, "one");
            assert!(expected.contains("String"));
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_raw_result_downcast() -> TestResult {
    init_tracing();

    let one = return_value("one", 1_i64);
    let ctx = ExecutionContext::new();
    ctx.execute(&one).await?;

    let raw = ctx.get_raw("one")?;
    assert!(raw.has_value());
    assert_eq!(raw.downcast::<i64>().as_deref(), Some(&1));
    assert!(raw.downcast::<i32>().is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_state_of_tracks_live_states() -> TestResult {
    init_tracing();

    let calls = counter();
    let slow = counting_with_delay("slow", 1, &calls, Duration::from_millis(300));
    let after = add_one("after", &slow);

    let ctx = ExecutionContext::new();
    assert_eq!(ctx.state_of("after"), State::Created);

    let runner = ctx.clone();
    let target = after.clone();
    let handle = tokio::spawn(async move { runner.execute(&target).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(ctx.state_of("slow"), State::Running);
    assert_eq!(ctx.state_of("after"), State::Waiting);
    assert!(ctx.in_flight() >= 2);

    let result = with_timeout(handle).await??;
    assert_eq!(result.value(), Some(&2));
    assert_eq!(ctx.state_of("after"), State::Succeeded);
    assert_eq!(ctx.in_flight(), 0);
    Ok(())
}

#[tokio::test]
async fn test_results_and_failures_snapshot() -> TestResult {
    init_tracing();

    let fail = failing::<i32>("fail", "boom");
    let broken = add_one("broken", &fail);
    let ok = return_value("ok", 1);

    let ctx = ExecutionContext::new();
    ctx.execute(&broken).await?;
    ctx.execute(&ok).await?;

    assert_eq!(
        ctx.results(),
        vec![
            ("broken".to_string(), State::UpstreamFailed),
            ("fail".to_string(), State::Failed),
            ("ok".to_string(), State::Succeeded),
        ]
    );

    let failures = ctx.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "fail");
    Ok(())
}

#[tokio::test]
async fn test_execute_any_resolves_erased_tasks() -> TestResult {
    init_tracing();

    let calls = counter();
    let one = counting("one", 1, &calls);
    let label = one.transform(|n: &i32| format!("n={n}"));
    let shown: Task<String> = Task::builder("shown")
        .input("label", label)
        .run(|inputs| async move { Ok(inputs.cloned::<String>("label")?) });
    let fail = failing::<i32>("fail", "boom");

    let ctx = ExecutionContext::new();
    let erased: Vec<AnyTask> = vec![shown.erased(), fail.erased()];

    let raw = ctx.execute_any(&erased[0]).await;
    assert_eq!(raw.state(), State::Succeeded);
    assert_eq!(raw.downcast::<String>().as_deref(), Some(&"n=1".to_string()));

    let raw = ctx.execute_any(&erased[1]).await;
    assert_eq!(raw.state(), State::Failed);
    assert!(raw.error().is_some_and(|e| e.to_string().contains("boom")));
    assert!(!raw.has_value());

    // Same run: the typed view sees what the erased call stored.
    assert_eq!(ctx.execute(&shown).await?.value().map(String::as_str), Some("n=1"));
    assert_eq!(count(&calls), 1);
    Ok(())
}
