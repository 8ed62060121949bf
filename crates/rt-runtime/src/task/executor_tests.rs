// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::event_bus::EventBus;
use crate::extension::ExtensionSystem;
use crate::registry::{TaskDefinition, TaskRegistry};
use crate::resilience::RetryPolicy;
use rt_core::FakeClock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn executor(registry: TaskRegistry) -> (Arc<TaskExecutor>, Arc<FakeClock>) {
    let clock = Arc::new(FakeClock::new());
    let extensions = Arc::new(ExtensionSystem::new());
    let bus = Arc::new(EventBus::new(clock.clone(), extensions.clone()));
    let executor = Arc::new(TaskExecutor::new(Arc::new(registry), extensions, bus, clock.clone()));
    (executor, clock)
}

#[tokio::test]
async fn executes_a_registered_task_to_completion() {
    let registry = TaskRegistry::new();
    registry.register(TaskDefinition::new("greet", Arc::new(|ctx: TaskContext| async move {
        Ok(json!({"greeting": format!("hello {}", ctx.input["name"])}))
    })));
    let (executor, _clock) = executor(registry);

    let execution = executor.execute_task("greet", json!({"name": "ada"})).await.unwrap();
    assert_eq!(execution.status, TaskStatus::Completed);
    assert_eq!(execution.result.unwrap()["greeting"], "hello \"ada\"");
    assert!(execution.started_at.is_some());
    assert!(execution.completed_at.is_some());
}

#[tokio::test]
async fn unregistered_task_type_fails_with_not_found() {
    let registry = TaskRegistry::new();
    let (executor, _clock) = executor(registry);
    let err = executor.execute_task("missing", json!({})).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn handler_error_with_no_retry_policy_fails_immediately_at_attempt_one() {
    let registry = TaskRegistry::new();
    let calls = Arc::new(AtomicU32::new(0));
    let calls2 = calls.clone();
    registry.register(TaskDefinition::new("flaky", Arc::new(move |_ctx: TaskContext| {
        let calls = calls2.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DomainError::handler("Error", "boom"))
        }
    })));
    let (executor, _clock) = executor(registry);

    let execution = executor.execute_task("flaky", json!({})).await.unwrap();
    assert_eq!(execution.status, TaskStatus::Failed);
    assert_eq!(execution.attempt_number, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retries_until_success_within_max_attempts() {
    let registry = TaskRegistry::new();
    let calls = Arc::new(AtomicU32::new(0));
    let calls2 = calls.clone();
    registry.register(
        TaskDefinition::new("flaky", Arc::new(move |_ctx: TaskContext| {
            let calls = calls2.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(DomainError::handler("Error", "not yet"))
                } else {
                    Ok(json!("done"))
                }
            }
        }))
        .retry_policy(RetryPolicy::fixed(5, Duration::from_millis(1))),
    );
    let (executor, _clock) = executor(registry);

    let execution = executor.execute_task("flaky", json!({})).await.unwrap();
    assert_eq!(execution.status, TaskStatus::Completed);
    assert_eq!(execution.attempt_number, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausting_retries_ends_in_failed_with_final_error() {
    let registry = TaskRegistry::new();
    registry.register(
        TaskDefinition::new("always_fails", Arc::new(|_ctx: TaskContext| async move {
            Err(DomainError::handler("Error", "always"))
        }))
        .retry_policy(RetryPolicy::fixed(3, Duration::from_millis(1))),
    );
    let (executor, _clock) = executor(registry);

    let execution = executor.execute_task("always_fails", json!({})).await.unwrap();
    assert_eq!(execution.status, TaskStatus::Failed);
    assert_eq!(execution.attempt_number, 3);
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_fails_the_attempt_as_a_timeout() {
    let registry = TaskRegistry::new();
    registry.register(
        TaskDefinition::new("slow", Arc::new(|_ctx: TaskContext| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(json!("never"))
        }))
        .timeout(Duration::ZERO),
    );
    let (executor, _clock) = executor(registry);

    let execution = executor.execute_task("slow", json!({})).await.unwrap();
    assert_eq!(execution.status, TaskStatus::Failed);
    assert_eq!(execution.error.unwrap().kind(), "timeout");
}

#[tokio::test(start_paused = true)]
async fn handler_finishing_just_before_the_deadline_still_completes() {
    let registry = TaskRegistry::new();
    registry.register(
        TaskDefinition::new("just_in_time", Arc::new(|_ctx: TaskContext| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok(json!("done"))
        }))
        .timeout(Duration::from_millis(10)),
    );
    let (executor, _clock) = executor(registry);

    let execution = executor.execute_task("just_in_time", json!({})).await.unwrap();
    assert_eq!(execution.status, TaskStatus::Completed);
}

#[tokio::test]
async fn cancelling_an_in_flight_execution_yields_cancelled_status() {
    let registry = TaskRegistry::new();
    registry.register(TaskDefinition::new("waits", Arc::new(|ctx: TaskContext| async move {
        loop {
            if ctx.is_cancelled() {
                return ctx.throw_if_cancelled().map(|_| Value::Null);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })));
    let (executor, _clock) = executor(registry);

    let exec_for_cancel = executor.clone();
    let handle = tokio::spawn(async move { exec_for_cancel.execute_task("waits", json!({})).await });

    // Give the spawned execution a chance to register its token before cancelling.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let running_id = {
        let executions = executor.executions.read();
        *executions.keys().next().expect("execution registered")
    };
    executor.cancel(running_id).unwrap();

    let execution = handle.await.unwrap().unwrap();
    assert_eq!(execution.status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn dependency_results_are_threaded_into_the_dependent_context() {
    let registry = TaskRegistry::new();
    registry.register(TaskDefinition::new("base", Arc::new(|_ctx: TaskContext| async move { Ok(json!(41)) })));
    registry.register(TaskDefinition::new("increment", Arc::new(|ctx: TaskContext| async move {
        let base: i64 = ctx
            .previous_results
            .values()
            .next()
            .and_then(|v| v.as_i64())
            .unwrap_or_default();
        Ok(json!(base + 1))
    })));
    let (executor, _clock) = executor(registry);

    let base_execution = executor.execute_task("base", json!({})).await.unwrap();
    let dependent = executor
        .execute_task_with_dependencies("increment", json!({}), &[base_execution.id])
        .await
        .unwrap();
    assert_eq!(dependent.result.unwrap(), json!(42));
}

#[tokio::test]
async fn dependency_that_did_not_complete_fails_with_dependency_failed() {
    let registry = TaskRegistry::new();
    registry.register(TaskDefinition::new("base", Arc::new(|_ctx: TaskContext| async move {
        Err(DomainError::handler("Error", "boom"))
    })));
    registry.register(TaskDefinition::new("dependent", Arc::new(|_ctx: TaskContext| async move { Ok(Value::Null) })));
    let (executor, _clock) = executor(registry);

    let base_execution = executor.execute_task("base", json!({})).await.unwrap();
    assert_eq!(base_execution.status, TaskStatus::Failed);

    let err = executor
        .execute_task_with_dependencies("dependent", json!({}), &[base_execution.id])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "dependency_failed");
}

#[tokio::test]
async fn dependency_still_running_is_awaited_rather_than_snapshotted_as_failed() {
    let registry = TaskRegistry::new();
    registry.register(TaskDefinition::new("slow_base", Arc::new(|_ctx: TaskContext| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(json!(41))
    })));
    registry.register(TaskDefinition::new("increment", Arc::new(|ctx: TaskContext| async move {
        let base: i64 = ctx
            .previous_results
            .values()
            .next()
            .and_then(|v| v.as_i64())
            .unwrap_or_default();
        Ok(json!(base + 1))
    })));
    let (executor, _clock) = executor(registry);

    let exec_for_base = executor.clone();
    let base_handle = tokio::spawn(async move { exec_for_base.execute_task("slow_base", json!({})).await });

    // Give the spawned execution a chance to register as `pending`/`running`
    // before the dependent call below observes it.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let base_id = {
        let executions = executor.executions.read();
        *executions.keys().next().expect("execution registered")
    };

    // `base` is still running at this point; a snapshot-once implementation
    // would wrongly treat it as a failed dependency instead of awaiting it.
    let dependent = executor
        .execute_task_with_dependencies("increment", json!({}), &[base_id])
        .await
        .unwrap();
    assert_eq!(dependent.result.unwrap(), json!(42));

    let base_execution = base_handle.await.unwrap().unwrap();
    assert_eq!(base_execution.status, TaskStatus::Completed);
}

#[tokio::test]
async fn nested_dependency_resolution_detects_an_actual_circular_dependency() {
    let registry = TaskRegistry::new();
    registry.register(TaskDefinition::new("a", Arc::new(|ctx: TaskContext| async move {
        let b_execution = ctx.execute_dependency("b", json!({}), &[]).await?;
        Ok(json!({
            "bStatus": format!("{:?}", b_execution.status),
            "bError": b_execution.error.map(|e| e.kind().to_string()),
        }))
    })));
    registry.register(TaskDefinition::new("b", Arc::new(|ctx: TaskContext| async move {
        // Closes the cycle: "a" is still on `ctx.dependency_stack` here.
        ctx.execute_dependency("a", json!({}), &[]).await.map(|exec| json!(exec.status == TaskStatus::Completed))
    })));
    let (executor, _clock) = executor(registry);

    let outer = executor.execute_task_with_dependencies("a", json!({}), &[]).await.unwrap();
    assert_eq!(outer.status, TaskStatus::Completed);
    assert_eq!(outer.result.unwrap()["bError"], json!("circular_dependency"));
}
