#![allow(dead_code)]

//! Fixture tasks shared by the integration tests.
//!
//! Every fixture that can observe how often it ran takes a [`Counter`];
//! run-once assertions read it back with [`count`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::anyhow;
use dagrun::{Input, Task, TaskBuilder};

/// Shared side-effect counter.
pub type Counter = Arc<AtomicUsize>;

pub fn counter() -> Counter {
    Arc::new(AtomicUsize::new(0))
}

pub fn count(counter: &Counter) -> usize {
    counter.load(Ordering::SeqCst)
}

/// Task with no inputs that returns `value`.
pub fn return_value<T>(id: &str, value: T) -> Task<T>
where
    T: Clone + Send + Sync + 'static,
{
    Task::builder(id).run(move |_| {
        let value = value.clone();
        async move { Ok(value) }
    })
}

/// Task with no inputs that returns `value` and bumps `counter` each time
/// its work function runs.
pub fn counting<T>(id: &str, value: T, counter: &Counter) -> Task<T>
where
    T: Clone + Send + Sync + 'static,
{
    counting_with_delay(id, value, counter, Duration::ZERO)
}

/// Like [`counting`], holding the task in `Running` for `delay` so that
/// concurrent requests overlap with the execution.
pub fn counting_with_delay<T>(id: &str, value: T, counter: &Counter, delay: Duration) -> Task<T>
where
    T: Clone + Send + Sync + 'static,
{
    let counter = Arc::clone(counter);
    Task::builder(id).run(move |_| {
        let value = value.clone();
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(value)
        }
    })
}

/// Task with no inputs that returns `flag`; meant as a skip gate.
pub fn return_bool(id: &str, flag: bool) -> Task<bool> {
    return_value(id, flag)
}

/// Task whose work function always fails with `message`.
pub fn failing<T>(id: &str, message: &str) -> Task<T>
where
    T: Send + Sync + 'static,
{
    let message = message.to_string();
    Task::builder(id).run(move |_| {
        let message = message.clone();
        async move { Err(anyhow!(message)) }
    })
}

/// `x + 1`, with `x` bound to `input`.
pub fn add_one(id: &str, input: impl Into<Input<i32>>) -> Task<i32> {
    add_one_builder(id, input).run(|inputs| async move { Ok(inputs.cloned::<i32>("x")? + 1) })
}

/// Builder for [`add_one`], for tests that still need to attach gates or
/// ordering links.
pub fn add_one_builder(id: &str, input: impl Into<Input<i32>>) -> TaskBuilder<i32> {
    Task::builder(id).input("x", input)
}

/// `a + b`.
pub fn add(id: &str, a: impl Into<Input<i32>>, b: impl Into<Input<i32>>) -> Task<i32> {
    Task::builder(id)
        .input("a", a)
        .input("b", b)
        .run(|inputs| async move { Ok(inputs.cloned::<i32>("a")? + inputs.cloned::<i32>("b")?) })
}

/// `x + 1` that also bumps `counter`.
pub fn counting_add_one(id: &str, input: impl Into<Input<i32>>, counter: &Counter) -> Task<i32> {
    let counter = Arc::clone(counter);
    Task::builder(id).input("x", input).run(move |inputs| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(inputs.cloned::<i32>("x")? + 1)
        }
    })
}
