mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::*;
use dagrun::{ExecutionContext, State, Task};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requesters_run_task_once() -> TestResult {
    init_tracing();

    let calls = counter();
    let shared = counting_with_delay("shared", 7, &calls, Duration::from_millis(50));

    let ctx = ExecutionContext::new();
    let mut handles = Vec::new();
    for _ in 0..16 {
        let ctx = ctx.clone();
        let shared = shared.clone();
        handles.push(tokio::spawn(async move { ctx.execute(&shared).await }));
    }

    for handle in handles {
        let result = with_timeout(handle).await??;
        assert_eq!(result.value(), Some(&7));
    }
    assert_eq!(count(&calls), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_wide_fan_in_runs_shared_root_once() -> TestResult {
    init_tracing();

    let calls = counter();
    let root = counting_with_delay("root", 1, &calls, Duration::from_millis(20));
    let branches: Vec<Task<i32>> = (0..10)
        .map(|i| add_one(&format!("branch_{i}"), &root))
        .collect();

    let mut sink = Task::<i32>::builder("sink");
    for (i, branch) in branches.iter().enumerate() {
        sink = sink.input(format!("in_{i}"), branch);
    }
    let sink: Task<i32> = sink.run(|inputs| async move {
        let mut total = 0;
        for i in 0..10 {
            total += inputs.cloned::<i32>(&format!("in_{i}"))?;
        }
        Ok(total)
    });

    let ctx = ExecutionContext::new();
    let result = with_timeout(ctx.execute(&sink)).await?;

    assert_eq!(result.value(), Some(&20));
    assert_eq!(count(&calls), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_branches_run_in_parallel() -> TestResult {
    init_tracing();

    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let make = |id: &str| -> Task<()> {
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        Task::builder(id).run(move |_| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
    };

    let left = make("left");
    let right = make("right");
    let join: Task<()> = Task::builder("join")
        .wait_on(&left)
        .wait_on(&right)
        .run(|_| async { Ok(()) });

    let ctx = ExecutionContext::new();
    let result = with_timeout(ctx.execute(&join)).await?;

    assert_eq!(result.state(), State::Succeeded);
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_work_never_starts_before_upstream_is_terminal() -> TestResult {
    init_tracing();

    let calls = counter();
    let slow = counting_with_delay("slow", 1, &calls, Duration::from_millis(30));
    let observed = calls.clone();
    let check: Task<bool> = Task::builder("check")
        .input("x", &slow)
        .run(move |_| {
            let seen = count(&observed);
            async move { Ok(seen == 1) }
        });

    let ctx = ExecutionContext::new();
    assert_eq!(ctx.execute(&check).await?.value(), Some(&true));
    Ok(())
}

#[tokio::test]
async fn test_dropped_requester_does_not_rerun_task() -> TestResult {
    init_tracing();

    let calls = counter();
    let slow = counting_with_delay("slow", 1, &calls, Duration::from_millis(200));

    let ctx = ExecutionContext::new();
    let abandoned = tokio::time::timeout(Duration::from_millis(50), ctx.execute(&slow)).await;
    assert!(abandoned.is_err());

    let result = within(Duration::from_secs(1), ctx.execute(&slow)).await?;
    assert_eq!(result.value(), Some(&1));
    assert_eq!(count(&calls), 1);
    Ok(())
}

#[tokio::test]
async fn test_dropped_requester_still_records_result() -> TestResult {
    init_tracing();

    let calls = counter();
    let slow = counting_with_delay("slow", 1, &calls, Duration::from_millis(200));
    let next = add_one("next", &slow);

    let ctx = ExecutionContext::new();
    let abandoned = tokio::time::timeout(Duration::from_millis(50), ctx.execute(&next)).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(ctx.state_of("slow"), State::Succeeded);
    assert_eq!(ctx.state_of("next"), State::Succeeded);
    assert_eq!(ctx.in_flight(), 0);
    assert_eq!(ctx.get_result(&next)?.value(), Some(&2));
    assert_eq!(count(&calls), 1);
    Ok(())
}
