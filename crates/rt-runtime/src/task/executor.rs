// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task executor (C4): runs one task attempt at a time to completion,
//! racing the handler against cancellation and an optional timeout, and
//! drives the retry loop between attempts.

use super::{ExecutionId, TaskContext, TaskExecution, TaskStatus};
use crate::event_bus::EventBus;
use crate::extension::ExtensionSystem;
use crate::registry::TaskRegistry;
use parking_lot::RwLock;
use rt_core::{CancellationToken, Clock, DomainError, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Runs registered task definitions, one attempt at a time, applying
/// retry/timeout/cancellation around each attempt and publishing the
/// lifecycle events other components observe.
pub struct TaskExecutor {
    registry: Arc<TaskRegistry>,
    extensions: Arc<ExtensionSystem>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    executions: RwLock<HashMap<ExecutionId, TaskExecution>>,
    tokens: RwLock<HashMap<ExecutionId, CancellationToken>>,
    completions: RwLock<HashMap<ExecutionId, CompletionSignal>>,
}

impl TaskExecutor {
    pub fn new(
        registry: Arc<TaskRegistry>,
        extensions: Arc<ExtensionSystem>,
        event_bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            extensions,
            event_bus,
            clock,
            executions: RwLock::new(HashMap::new()),
            tokens: RwLock::new(HashMap::new()),
            completions: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_execution(&self, id: ExecutionId) -> Result<TaskExecution> {
        self.executions.read().get(&id).cloned().ok_or_else(|| DomainError::not_found("task_execution", id.to_string()))
    }

    /// Request cancellation of an in-flight execution. A no-op (but not an
    /// error) once the execution has already reached a terminal status.
    pub fn cancel(&self, id: ExecutionId) -> Result<()> {
        let token = self
            .tokens
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("task_execution", id.to_string()))?;
        token.cancel();
        Ok(())
    }

    /// Cancel every execution still `running`, used during façade shutdown
    /// (spec §10.7, "graceful stop() ordering").
    pub fn cancel_all_running(&self) {
        let running: Vec<ExecutionId> = self
            .executions
            .read()
            .iter()
            .filter(|(_, e)| e.status == TaskStatus::Running)
            .map(|(id, _)| *id)
            .collect();
        let tokens = self.tokens.read();
        for id in running {
            if let Some(token) = tokens.get(&id) {
                token.cancel();
            }
        }
    }

    /// Wait until `id`'s execution reaches a terminal status, polling its
    /// per-execution [`CompletionSignal`] rather than snapshotting the
    /// status once (spec §4.3, "wait until each dependency's execution is
    /// terminal").
    async fn wait_for_terminal(&self, id: ExecutionId) -> Result<TaskExecution> {
        loop {
            let execution = self.get_execution(id)?;
            if execution.status.is_terminal() {
                return Ok(execution);
            }
            let signal = self
                .completions
                .read()
                .get(&id)
                .cloned()
                .ok_or_else(|| DomainError::not_found("task_execution", id.to_string()))?;
            signal.wait().await;
        }
    }

    /// Execute a single task by type, with no dependencies.
    pub async fn execute_task(self: &Arc<Self>, task_type: &str, input: Value) -> Result<TaskExecution> {
        self.run(task_type, input, HashMap::new(), Vec::new()).await
    }

    /// Execute a task after waiting for each of `dependency_ids` to reach a
    /// terminal status. Fails with `DependencyFailed` if any dependency did
    /// not complete successfully, and with `CircularDependency` if this call
    /// is already on the dependency stack for `task_type` (i.e. a dependency
    /// transitively depends on the task that is waiting for it). Starts a
    /// fresh dependency stack; see [`Self::execute_task_with_dependencies_in`]
    /// for continuing an existing one across nested resolution.
    pub async fn execute_task_with_dependencies(
        self: &Arc<Self>,
        task_type: &str,
        input: Value,
        dependency_ids: &[ExecutionId],
    ) -> Result<TaskExecution> {
        self.execute_task_with_dependencies_in(task_type, input, dependency_ids, Vec::new()).await
    }

    /// Like [`Self::execute_task_with_dependencies`], but continues
    /// `caller_stack` instead of starting a fresh one. [`TaskContext::execute_dependency`]
    /// calls this with the current attempt's own `dependency_stack`, so a
    /// task type that reappears further down its own ancestor chain
    /// (A depends on B depends on A) is actually caught as
    /// `CircularDependency` instead of each nested call resetting the stack
    /// to length one (spec §9, "circular-dependency detection via stack").
    pub async fn execute_task_with_dependencies_in(
        self: &Arc<Self>,
        task_type: &str,
        input: Value,
        dependency_ids: &[ExecutionId],
        caller_stack: Vec<String>,
    ) -> Result<TaskExecution> {
        let mut previous_results = HashMap::new();
        for dep_id in dependency_ids {
            let dep = self.wait_for_terminal(*dep_id).await?;
            if dep.status != TaskStatus::Completed {
                return Err(DomainError::DependencyFailed { dependency_id: dep_id.to_string() });
            }
            if let Some(result) = dep.result.clone() {
                previous_results.insert(dep_id.to_string(), result);
            }
        }
        let mut stack = caller_stack;
        stack.push(task_type.to_string());
        self.run(task_type, input, previous_results, stack).await
    }

    async fn run(
        self: &Arc<Self>,
        task_type: &str,
        input: Value,
        previous_results: HashMap<String, Value>,
        dependency_stack: Vec<String>,
    ) -> Result<TaskExecution> {
        if dependency_stack.iter().filter(|t| t.as_str() == task_type).count() > 1 {
            return Err(DomainError::CircularDependency { cycle: dependency_stack.join(" -> ") });
        }

        let definition = self.registry.get(task_type)?;

        let before = self
            .extensions
            .execute_extension_point("task:beforeExecute", json!({"taskType": task_type, "input": input}))
            .await?;
        let input = before.get("input").cloned().unwrap_or(input);

        let execution_id;
        let token = CancellationToken::new();
        {
            let execution = TaskExecution::new(task_type, input.clone(), self.clock.epoch_ms());
            execution_id = execution.id;
            self.executions.write().insert(execution_id, execution);
            self.tokens.write().insert(execution_id, token.clone());
            self.completions.write().insert(execution_id, CompletionSignal::new());
        }

        let max_attempts = definition.retry_policy.as_ref().map(|p| p.max_attempts).unwrap_or(1);
        let mut attempt = 1u32;

        loop {
            self.set_running(execution_id, attempt);
            if attempt == 1 {
                self.event_bus
                    .publish(
                        "task.started",
                        json!({"executionId": execution_id.to_string(), "taskType": task_type, "attempt": attempt}),
                    )
                    .await?;
            } else {
                self.event_bus
                    .publish(
                        "task:retryAttempt",
                        json!({"executionId": execution_id.to_string(), "taskType": task_type, "attempt": attempt}),
                    )
                    .await?;
            }

            let ctx = TaskContext::new(
                input.clone(),
                attempt,
                token.clone(),
                previous_results.clone(),
                dependency_stack.clone(),
                self.event_bus.clone(),
                Arc::downgrade(self),
            );

            let outcome = self.run_attempt(&definition, execution_id, ctx, &token, definition.timeout).await;

            match outcome {
                Ok(value) => {
                    let after = self
                        .extensions
                        .execute_extension_point(
                            "task:afterExecute",
                            json!({"executionId": execution_id.to_string(), "taskType": task_type, "result": value}),
                        )
                        .await?;
                    let value = after.get("result").cloned().unwrap_or(value);
                    self.set_completed(execution_id, value.clone());
                    self.event_bus
                        .publish(
                            "task.completed",
                            json!({"executionId": execution_id.to_string(), "taskType": task_type, "result": value}),
                        )
                        .await?;
                    return self.get_execution(execution_id);
                }
                Err(DomainError::Cancelled) => {
                    self.set_cancelled(execution_id);
                    self.event_bus
                        .publish("task.cancelled", json!({"executionId": execution_id.to_string(), "taskType": task_type}))
                        .await?;
                    return self.get_execution(execution_id);
                }
                Err(err) => {
                    let _ = self
                        .extensions
                        .execute_extension_point(
                            "task:onError",
                            json!({"executionId": execution_id.to_string(), "taskType": task_type, "error": err.kind()}),
                        )
                        .await;

                    let retryable = definition.retry_policy.as_ref().is_some_and(|p| p.is_retryable(&err)) && attempt < max_attempts;
                    if !retryable {
                        self.set_failed(execution_id, err.clone());
                        self.event_bus
                            .publish(
                                "task.failed",
                                json!({"executionId": execution_id.to_string(), "taskType": task_type, "error": err.kind(), "attempt": attempt}),
                            )
                            .await?;
                        return self.get_execution(execution_id);
                    }

                    let delay = definition.retry_policy.as_ref().expect("retryable implies a policy").delay_for_attempt(attempt);
                    tracing::warn!(execution_id = %execution_id, task_type, attempt, error = %err, delay_ms = delay.as_millis() as u64, "task attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Race the handler against cancellation and an optional timeout.
    /// Cancellation takes precedence over a timeout firing in the same
    /// poll, which in turn takes precedence over the handler completing.
    async fn run_attempt(
        &self,
        definition: &crate::registry::TaskDefinition,
        execution_id: ExecutionId,
        ctx: TaskContext,
        token: &CancellationToken,
        timeout: Option<std::time::Duration>,
    ) -> Result<Value> {
        let handler = definition.handler.clone();
        tokio::select! {
            biased;
            _ = cancelled(token) => Err(DomainError::Cancelled),
            _ = sleep_or_forever(timeout) => {
                Err(DomainError::Timeout {
                    execution_id: execution_id.to_string(),
                    elapsed_ms: timeout.map(|d| d.as_millis() as u64).unwrap_or(0),
                })
            }
            result = handler.handle(ctx) => result,
        }
    }

    fn set_running(&self, id: ExecutionId, attempt: u32) {
        let mut executions = self.executions.write();
        if let Some(execution) = executions.get_mut(&id) {
            execution.status = TaskStatus::Running;
            execution.attempt_number = attempt;
            if execution.started_at.is_none() {
                execution.started_at = Some(self.clock.epoch_ms());
            }
        }
    }

    fn set_completed(&self, id: ExecutionId, result: Value) {
        let mut executions = self.executions.write();
        if let Some(execution) = executions.get_mut(&id) {
            execution.status = TaskStatus::Completed;
            execution.result = Some(result);
            execution.completed_at = Some(self.clock.epoch_ms());
        }
        drop(executions);
        self.fire_completion(id);
    }

    fn set_failed(&self, id: ExecutionId, error: DomainError) {
        let mut executions = self.executions.write();
        if let Some(execution) = executions.get_mut(&id) {
            execution.status = TaskStatus::Failed;
            execution.error = Some(error);
            execution.completed_at = Some(self.clock.epoch_ms());
        }
        drop(executions);
        self.fire_completion(id);
    }

    fn set_cancelled(&self, id: ExecutionId) {
        let mut executions = self.executions.write();
        if let Some(execution) = executions.get_mut(&id) {
            execution.status = TaskStatus::Cancelled;
            execution.completed_at = Some(self.clock.epoch_ms());
        }
        drop(executions);
        self.fire_completion(id);
    }

    /// Wake every `wait_for_terminal` caller blocked on `id`, once its
    /// status has just become terminal.
    fn fire_completion(&self, id: ExecutionId) {
        if let Some(signal) = self.completions.read().get(&id) {
            signal.fire();
        }
    }
}

/// Resolves once `token` is cancelled (immediately, if already cancelled).
async fn cancelled(token: &CancellationToken) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    token.on_cancel(move || {
        let _ = tx.send(());
    });
    let _ = rx.await;
}

/// A one-shot signal fired when an execution reaches a terminal status, so
/// `execute_task_with_dependencies` can actually wait for it instead of
/// snapshotting the status once (spec §4.3). Built on the same one-shot
/// flag-plus-callback-list primitive as [`CancellationToken`], repurposed
/// here to mean "this execution finished" rather than "cancel this".
#[derive(Clone)]
struct CompletionSignal(CancellationToken);

impl CompletionSignal {
    fn new() -> Self {
        Self(CancellationToken::new())
    }

    fn fire(&self) {
        self.0.cancel();
    }

    async fn wait(&self) {
        cancelled(&self.0).await;
    }
}

/// Resolves after `duration`, or never if `duration` is `None`.
fn sleep_or_forever(duration: Option<std::time::Duration>) -> impl Future<Output = ()> {
    async move {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
