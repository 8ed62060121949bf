// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::health::HealthStatus;
use crate::registry::TaskDefinition;
use crate::task::TaskContext;
use rt_core::FakeClock;

fn opts() -> RuntimeOptions {
    RuntimeOptions { version: "1.0.0".to_string(), config: json!({}) }
}

#[tokio::test]
async fn lifecycle_rejects_operations_out_of_order() {
    let runtime = Runtime::new(Arc::new(FakeClock::new()));
    assert!(runtime.start().is_err());
    assert!(runtime.stop("early").await.is_err());
    assert!(runtime.cleanup().is_err());

    runtime.initialize(opts()).await.unwrap();
    assert!(runtime.initialize(opts()).await.is_err());

    runtime.start().unwrap();
    assert!(runtime.start().is_err());

    runtime.stop("done").await.unwrap();
    assert!(runtime.stop("again").await.is_err());

    runtime.cleanup().unwrap();
    assert!(runtime.cleanup().is_err());
}

#[tokio::test]
async fn initialize_registers_every_built_in_extension_point() {
    let runtime = Runtime::new(Arc::new(FakeClock::new()));
    runtime.initialize(opts()).await.unwrap();
    let points = runtime.extensions().registered_points();
    for expected in BUILT_IN_EXTENSION_POINTS {
        assert!(points.iter().any(|p| p == expected), "missing point {expected}");
    }
}

#[tokio::test]
async fn health_reports_not_running_before_start() {
    let runtime = Runtime::new(Arc::new(FakeClock::new()));
    runtime.initialize(opts()).await.unwrap();
    let report = runtime.get_health();
    assert_ne!(report.status, HealthStatus::Healthy);
}

#[tokio::test]
async fn health_is_healthy_once_running() {
    let runtime = Runtime::new(Arc::new(FakeClock::new()));
    runtime.initialize(opts()).await.unwrap();
    runtime.start().unwrap();
    let report = runtime.get_health();
    assert_eq!(report.status, HealthStatus::Healthy);
    runtime.stop("test done").await.unwrap();
}

#[tokio::test]
async fn stop_cancels_in_flight_executions() {
    let runtime = Runtime::new(Arc::new(FakeClock::new()));
    runtime.task_registry().register(TaskDefinition::new("waits", Arc::new(|ctx: TaskContext| async move {
        loop {
            if ctx.is_cancelled() {
                return ctx.throw_if_cancelled().map(|_| Value::Null);
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    })));
    runtime.initialize(opts()).await.unwrap();
    runtime.start().unwrap();

    let executor = runtime.executor().clone();
    let handle = tokio::spawn(async move { executor.execute_task("waits", json!({})).await });
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    runtime.stop("shutting down").await.unwrap();
    let execution = handle.await.unwrap().unwrap();
    assert_eq!(execution.status, crate::task::TaskStatus::Cancelled);
}
