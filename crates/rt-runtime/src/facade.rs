// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime façade (C8): composes the extension system, event bus,
//! registries, task executor, scheduler, and process manager behind a
//! single `initialize -> start -> stop -> cleanup` lifecycle, and owns
//! health aggregation across them.

use crate::event_bus::EventBus;
use crate::extension::ExtensionSystem;
use crate::health::{ComponentHealth, HealthReport};
use crate::process::ProcessManager;
use crate::registry::{ProcessRegistry, TaskRegistry};
use crate::scheduler::Scheduler;
use crate::task::executor::TaskExecutor;
use parking_lot::{Mutex, RwLock};
use rt_core::{CancellationToken, Clock, DomainError, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Every built-in extension point named in §6, registered at `initialize`
/// so `hooks_for`/`registered_points` introspection sees them immediately,
/// even before any extension has hooked into them.
const BUILT_IN_EXTENSION_POINTS: &[&str] = &[
    "system:init",
    "system:shutdown",
    "system:error",
    "task:beforeExecute",
    "task:afterExecute",
    "task:onError",
    "process:created",
    "process:updated",
    "event:beforePublish",
    "event:afterPublish",
];

/// Opaque configuration payload the façade accepts at `initialize` and
/// forwards verbatim to the `system:init` hook (§10.4). The runtime never
/// parses `config` itself.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub version: String,
    pub config: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LifecycleState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

/// Composes every runtime component behind one lifecycle. Handlers and
/// extensions interact with the components it owns (`executor()`,
/// `scheduler()`, `process_manager()`, `event_bus()`, `extensions()`); the
/// façade itself only governs their shared lifecycle and health.
pub struct Runtime {
    clock: Arc<dyn Clock>,
    extensions: Arc<ExtensionSystem>,
    event_bus: Arc<EventBus>,
    task_registry: Arc<TaskRegistry>,
    process_registry: Arc<ProcessRegistry>,
    executor: Arc<TaskExecutor>,
    scheduler: Arc<Scheduler>,
    process_manager: Arc<ProcessManager>,
    state: RwLock<LifecycleState>,
    scheduler_driver: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl Runtime {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let extensions = Arc::new(ExtensionSystem::new());
        let event_bus = Arc::new(EventBus::new(clock.clone(), extensions.clone()));
        let task_registry = Arc::new(TaskRegistry::new());
        let process_registry = Arc::new(ProcessRegistry::new());
        let executor = Arc::new(TaskExecutor::new(task_registry.clone(), extensions.clone(), event_bus.clone(), clock.clone()));
        let scheduler = Arc::new(Scheduler::new(clock.clone()));
        let process_manager = Arc::new(ProcessManager::new(process_registry.clone(), extensions.clone(), event_bus.clone(), clock.clone()));
        Self {
            clock,
            extensions,
            event_bus,
            task_registry,
            process_registry,
            executor,
            scheduler,
            process_manager,
            state: RwLock::new(LifecycleState::Uninitialized),
            scheduler_driver: Mutex::new(None),
        }
    }

    pub fn extensions(&self) -> &Arc<ExtensionSystem> {
        &self.extensions
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn task_registry(&self) -> &Arc<TaskRegistry> {
        &self.task_registry
    }

    pub fn process_registry(&self) -> &Arc<ProcessRegistry> {
        &self.process_registry
    }

    pub fn executor(&self) -> &Arc<TaskExecutor> {
        &self.executor
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn process_manager(&self) -> &Arc<ProcessManager> {
        &self.process_manager
    }

    fn require_state(&self, expected: LifecycleState, action: &str) -> Result<()> {
        let current = *self.state.read();
        if current != expected {
            return Err(DomainError::validation(format!("cannot {action} while runtime is {current:?}")));
        }
        Ok(())
    }

    /// Register every built-in extension point and run `system:init` with
    /// `options` as its params. Requires `uninitialized`.
    pub async fn initialize(&self, options: RuntimeOptions) -> Result<()> {
        self.require_state(LifecycleState::Uninitialized, "initialize")?;
        for point in BUILT_IN_EXTENSION_POINTS {
            self.extensions.register_extension_point(*point);
        }
        self.extensions
            .execute_extension_point("system:init", json!({"version": options.version, "config": options.config}))
            .await?;
        *self.state.write() = LifecycleState::Initialized;
        tracing::info!(version = %options.version, "runtime initialized");
        Ok(())
    }

    /// Start the scheduler's real driver loop. Requires `initialized`.
    pub fn start(&self) -> Result<()> {
        self.require_state(LifecycleState::Initialized, "start")?;
        let cancel = CancellationToken::new();
        let scheduler = self.scheduler.clone();
        let executor = self.executor.clone();
        let driver_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            scheduler
                .run(driver_cancel, |due| {
                    let executor = executor.clone();
                    async move {
                        if let Err(err) = executor.execute_task(&due.task_type, due.input).await {
                            tracing::error!(task_type = %due.task_type, error = %err, "scheduled task failed to start");
                        }
                    }
                })
                .await;
        });
        *self.scheduler_driver.lock() = Some((cancel, handle));
        *self.state.write() = LifecycleState::Running;
        tracing::info!("runtime started");
        Ok(())
    }

    /// Cancel the scheduler driver before any in-flight task executions, so
    /// no new attempt starts once shutdown begins (§10.7), then cancel all
    /// `running` executions and run `system:shutdown`. Requires `running`.
    pub async fn stop(&self, reason: impl Into<String>) -> Result<()> {
        self.require_state(LifecycleState::Running, "stop")?;
        if let Some((cancel, handle)) = self.scheduler_driver.lock().take() {
            cancel.cancel();
            let _ = handle.await;
        }
        self.executor.cancel_all_running();
        let _ = self.extensions.execute_extension_point("system:shutdown", json!({"reason": reason.into()})).await;
        *self.state.write() = LifecycleState::Stopped;
        tracing::info!("runtime stopped");
        Ok(())
    }

    /// Return to `uninitialized`, dropping subscriptions. Requires a prior
    /// `initialize` (any state but `uninitialized`).
    pub fn cleanup(&self) -> Result<()> {
        if *self.state.read() == LifecycleState::Uninitialized {
            return Err(DomainError::validation("cannot cleanup an uninitialized runtime"));
        }
        self.event_bus.clear_all_subscriptions();
        *self.state.write() = LifecycleState::Uninitialized;
        tracing::info!("runtime cleaned up");
        Ok(())
    }

    /// Aggregate per-component health (§4.8, §10.7).
    pub fn get_health(&self) -> HealthReport {
        let now = self.clock.epoch_ms();
        let mut components = std::collections::HashMap::new();

        let state = *self.state.read();
        if state != LifecycleState::Running {
            components.insert(
                "runtime".to_string(),
                ComponentHealth::degraded(format!("lifecycle state is {state:?}, not running"), now),
            );
        } else {
            components.insert("runtime".to_string(), ComponentHealth::healthy(now));
        }

        let pending = self.scheduler.pending_count();
        components.insert("scheduler".to_string(), ComponentHealth::healthy(now).with_detail(format!("{pending} pending firings")));

        let points = self.extensions.registered_points().len();
        components.insert("extension_system".to_string(), ComponentHealth::healthy(now).with_detail(format!("{points} registered points")));

        components.insert("event_bus".to_string(), ComponentHealth::healthy(now));
        components.insert("task_executor".to_string(), ComponentHealth::healthy(now));
        components.insert("process_manager".to_string(), ComponentHealth::healthy(now));

        HealthReport::aggregate(components)
    }
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
