// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task execution types shared between the registry and the executor
//! (spec §3, §4.3): identifiers, status, the in-memory execution record,
//! and the per-attempt [`TaskContext`] capability bundle handlers receive.

pub mod executor;

use async_trait::async_trait;
use rt_core::{define_id, CancellationToken, DomainError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;

define_id! {
    /// Identifies one `TaskExecution`. Unique within a runtime instance.
    pub struct ExecutionId("tex-");
}

/// `pending -> running -> {completed | failed | cancelled}`, no skips, no
/// back-edges, terminal is absorbing (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// An in-memory record of one task attempt sequence, stored in the
/// executor's execution map keyed by `id`.
#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub id: ExecutionId,
    pub task_type: String,
    pub status: TaskStatus,
    pub input: Value,
    pub result: Option<Value>,
    pub error: Option<DomainError>,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub attempt_number: u32,
}

impl TaskExecution {
    pub fn new(task_type: impl Into<String>, input: Value, created_at: u64) -> Self {
        Self {
            id: ExecutionId::new(),
            task_type: task_type.into(),
            status: TaskStatus::Pending,
            input,
            result: None,
            error: None,
            created_at,
            started_at: None,
            completed_at: None,
            attempt_number: 1,
        }
    }
}

/// Per-attempt capability bundle passed to a handler (spec §4.3 step 5,
/// §3 "weak reference"). Valid only for the duration of a single attempt;
/// handlers never retain runtime state beyond it.
pub struct TaskContext {
    pub input: Value,
    pub attempt_number: u32,
    pub cancellation_token: CancellationToken,
    /// Dependency execution id -> its result, populated by
    /// `executeTaskWithDependencies` (spec §4.3).
    pub previous_results: HashMap<String, Value>,
    /// The chain of task types currently being resolved via
    /// `executeTaskWithDependencies`, used locally for cycle detection
    /// (spec §9, "circular-dependency detection via stack").
    pub dependency_stack: Vec<String>,
    event_bus: std::sync::Arc<crate::event_bus::EventBus>,
    executor: std::sync::Weak<crate::task::executor::TaskExecutor>,
}

impl TaskContext {
    pub fn new(
        input: Value,
        attempt_number: u32,
        cancellation_token: CancellationToken,
        previous_results: HashMap<String, Value>,
        dependency_stack: Vec<String>,
        event_bus: std::sync::Arc<crate::event_bus::EventBus>,
        executor: std::sync::Weak<crate::task::executor::TaskExecutor>,
    ) -> Self {
        Self { input, attempt_number, cancellation_token, previous_results, dependency_stack, event_bus, executor }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn throw_if_cancelled(&self) -> Result<()> {
        self.cancellation_token.throw_if_cancelled()
    }

    /// Thin wrapper over the event bus (spec §4.3): lets a handler publish
    /// its own domain events mid-execution.
    pub async fn emit_event(&self, event_type: &str, payload: Value) -> Result<()> {
        self.event_bus.publish(event_type, payload).await?;
        Ok(())
    }

    /// Execute another task as a dependency of the current attempt,
    /// continuing this attempt's own `dependency_stack` rather than
    /// starting a fresh one, so a task type that reappears further down its
    /// own ancestor chain (A depends on B depends on A) is actually caught
    /// as `CircularDependency` (spec §9, "circular-dependency detection via
    /// stack").
    pub async fn execute_dependency(
        &self,
        task_type: &str,
        input: Value,
        dependency_ids: &[ExecutionId],
    ) -> Result<TaskExecution> {
        let executor = self
            .executor
            .upgrade()
            .ok_or_else(|| DomainError::Internal { message: "task executor no longer available".to_string() })?;
        executor.execute_task_with_dependencies_in(task_type, input, dependency_ids, self.dependency_stack.clone()).await
    }
}

/// A task handler. Implemented directly for any
/// `Fn(TaskContext) -> Fut` closure via the blanket impl below.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, ctx: TaskContext) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn handle(&self, ctx: TaskContext) -> Result<Value> {
        (self)(ctx).await
    }
}
