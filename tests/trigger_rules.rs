mod common;

use common::*;
use dagrun::State::*;
use dagrun::{ExecutionContext, State, Task, TriggerRule};

const ALL_RULES: [TriggerRule; 7] = [
    TriggerRule::AllSuccess,
    TriggerRule::AllFailed,
    TriggerRule::AllDone,
    TriggerRule::OneSuccess,
    TriggerRule::OneFailed,
    TriggerRule::NoneFailed,
    TriggerRule::NoneSkipped,
];

#[test]
fn test_non_terminal_predecessor_waits_for_every_rule() {
    for rule in ALL_RULES {
        for pending in [Created, Waiting, Running] {
            assert_eq!(rule.next_state(&[Succeeded, pending]), Waiting, "{rule}");
        }
    }
}

#[test]
fn test_no_predecessors_runs_for_every_rule() {
    for rule in ALL_RULES {
        assert_eq!(rule.next_state(&[]), Running, "{rule}");
    }
}

#[test]
fn test_all_success() {
    let rule = TriggerRule::AllSuccess;
    assert_eq!(rule.next_state(&[Succeeded, Succeeded]), Running);
    assert_eq!(rule.next_state(&[Succeeded, Failed]), UpstreamFailed);
    assert_eq!(rule.next_state(&[UpstreamFailed]), UpstreamFailed);
    assert_eq!(rule.next_state(&[Succeeded, Skipped]), UpstreamSkipped);
    assert_eq!(rule.next_state(&[UpstreamSkipped]), UpstreamSkipped);
}

#[test]
fn test_skip_takes_precedence_over_failure() {
    assert_eq!(
        TriggerRule::AllSuccess.next_state(&[Failed, Skipped]),
        UpstreamSkipped
    );
    assert_eq!(
        TriggerRule::AllFailed.next_state(&[Failed, UpstreamSkipped]),
        UpstreamSkipped
    );
}

#[test]
fn test_all_failed() {
    let rule = TriggerRule::AllFailed;
    assert_eq!(rule.next_state(&[Failed, UpstreamFailed]), Running);
    assert_eq!(rule.next_state(&[Failed, Succeeded]), UpstreamFailed);
    // Nothing failed at all: the rule can never fire.
    assert_eq!(rule.next_state(&[Succeeded, Succeeded]), UpstreamSkipped);
}

#[test]
fn test_all_done_runs_on_any_terminal_mix() {
    let rule = TriggerRule::AllDone;
    assert_eq!(rule.next_state(&[Succeeded, Failed, Skipped]), Running);
    assert_eq!(rule.next_state(&[UpstreamFailed, UpstreamSkipped]), Running);
    // The failing branch of this rule is shadowed by the waiting check.
    assert_eq!(rule.next_state(&[Failed, Running]), Waiting);
}

#[test]
fn test_one_success() {
    let rule = TriggerRule::OneSuccess;
    assert_eq!(rule.next_state(&[Failed, Succeeded]), Running);
    assert_eq!(rule.next_state(&[Skipped, UpstreamSkipped]), UpstreamFailed);
    assert_eq!(rule.next_state(&[Failed, Skipped]), Failed);
}

#[test]
fn test_one_failed_none_failed_none_skipped() {
    assert_eq!(TriggerRule::OneFailed.next_state(&[Succeeded]), Running);
    assert_eq!(TriggerRule::OneFailed.next_state(&[Failed]), Failed);
    assert_eq!(TriggerRule::NoneFailed.next_state(&[Skipped, Succeeded]), Running);
    assert_eq!(TriggerRule::NoneFailed.next_state(&[UpstreamFailed]), Failed);
    assert_eq!(TriggerRule::NoneSkipped.next_state(&[Failed]), Running);
    assert_eq!(TriggerRule::NoneSkipped.next_state(&[UpstreamSkipped]), Failed);
}

#[test]
fn test_rule_names_round_trip_through_from_str() {
    for rule in ALL_RULES {
        assert_eq!(rule.to_string().parse::<TriggerRule>(), Ok(rule));
    }
    assert!("sometimes".parse::<TriggerRule>().is_err());
}

#[test]
fn test_state_classification() {
    for state in [Created, Waiting, Running] {
        assert!(!state.is_terminal());
    }
    for state in [Skipped, Succeeded, Failed, UpstreamFailed, UpstreamSkipped] {
        assert!(state.is_terminal());
    }
    assert_eq!(UpstreamFailed.to_string(), "UPSTREAM_FAILED");
}

#[tokio::test]
async fn test_all_done_runs_after_failure() -> TestResult {
    init_tracing();

    let fail = failing::<i32>("fail", "boom");
    let cleanup: Task<&'static str> = Task::builder("cleanup")
        .wait_on(&fail)
        .trigger_rule(TriggerRule::AllDone)
        .run(|_| async { Ok("cleaned") });

    let ctx = ExecutionContext::new();
    let result = ctx.execute(&cleanup).await?;

    assert_eq!(result.state(), State::Succeeded);
    assert_eq!(result.value(), Some(&"cleaned"));
    Ok(())
}

#[tokio::test]
async fn test_one_success_runs_with_partial_failure() -> TestResult {
    init_tracing();

    let fail = failing::<i32>("fail", "boom");
    let ok = return_value("ok", 1);
    let either: Task<i32> = Task::builder("either")
        .input("ok", &ok)
        .wait_on(&fail)
        .trigger_rule(TriggerRule::OneSuccess)
        .run(|inputs| async move { Ok(inputs.cloned::<i32>("ok")? * 10) });

    let ctx = ExecutionContext::new();
    assert_eq!(ctx.execute(&either).await?.value(), Some(&10));
    Ok(())
}

#[tokio::test]
async fn test_unsatisfied_rule_is_failure_with_error() -> TestResult {
    init_tracing();

    let fail = failing::<i32>("fail", "boom");
    let strict: Task<i32> = Task::builder("strict")
        .wait_on(&fail)
        .trigger_rule(TriggerRule::NoneFailed)
        .run(|_| async { Ok(1) });

    let ctx = ExecutionContext::new();
    let result = ctx.execute(&strict).await?;

    assert_eq!(result.state(), State::Failed);
    let err = result.error().expect("rule failure carries an error");
    assert!(err.to_string().contains("none_failed"));
    Ok(())
}

#[tokio::test]
async fn test_all_failed_with_skipped_upstream() -> TestResult {
    init_tracing();

    let skipped: Task<i32> = Task::builder("skipped").skip(true).run(|_| async { Ok(1) });
    let fail = failing::<i32>("fail", "boom");
    let on_failure: Task<i32> = Task::builder("on_failure")
        .wait_on(&skipped)
        .wait_on(&fail)
        .trigger_rule(TriggerRule::AllFailed)
        .run(|_| async { Ok(1) });

    let ctx = ExecutionContext::new();
    assert_eq!(ctx.execute(&on_failure).await?.state(), State::UpstreamSkipped);
    Ok(())
}
