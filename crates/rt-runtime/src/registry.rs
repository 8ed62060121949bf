// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task and process registries (C3): read-only lookup of immutable
//! definitions by type (and, for processes, version). The core treats
//! these as repositories populated by an external registration surface
//! (spec §1 out-of-scope); this crate only implements the lookup contract
//! that surface is expected to satisfy.

use crate::resilience::RetryPolicy;
use crate::task::TaskHandler;
use async_trait::async_trait;
use parking_lot::RwLock;
use rt_core::{DomainError, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// `{type, handler, dependencies?, retryPolicy?, timeout?, metadata?}`
/// (spec §3). Immutable once registered.
pub struct TaskDefinition {
    pub task_type: String,
    pub handler: Arc<dyn TaskHandler>,
    pub dependencies: Vec<String>,
    pub retry_policy: Option<RetryPolicy>,
    pub timeout: Option<Duration>,
    pub metadata: HashMap<String, Value>,
}

impl TaskDefinition {
    pub fn new(task_type: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            task_type: task_type.into(),
            handler,
            dependencies: Vec::new(),
            retry_policy: None,
            timeout: None,
            metadata: HashMap::new(),
        }
    }

    rt_core::setters! {
        set { dependencies: Vec<String> }
        option { retry_policy: RetryPolicy }
        option { timeout: Duration }
    }
}

/// Read-only lookup of registered task definitions by type.
#[derive(Default)]
pub struct TaskRegistry {
    definitions: RwLock<HashMap<String, Arc<TaskDefinition>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, definition: TaskDefinition) {
        self.definitions.write().insert(definition.task_type.clone(), Arc::new(definition));
    }

    pub fn get(&self, task_type: &str) -> Result<Arc<TaskDefinition>> {
        self.definitions
            .read()
            .get(task_type)
            .cloned()
            .ok_or_else(|| DomainError::not_found("task", task_type))
    }

    pub fn contains(&self, task_type: &str) -> bool {
        self.definitions.read().contains_key(task_type)
    }
}

/// A guard predicate evaluated over a transition's process data before its
/// exit action runs (spec §4.5). Pure and synchronous: guards decide
/// whether to advance, they don't perform side effects.
pub trait Guard: Send + Sync {
    fn allows(&self, data: &Value) -> bool;
}

impl<F> Guard for F
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn allows(&self, data: &Value) -> bool {
        (self)(data)
    }
}

/// An entry/exit action run on transition. Returns the (possibly
/// transformed) process data; errors are caught, logged, and do not abort
/// the transition (spec §4.5, §9 open question 1).
#[async_trait]
pub trait ProcessAction: Send + Sync {
    async fn run(&self, data: Value) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> ProcessAction for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value>> + Send,
{
    async fn run(&self, data: Value) -> Result<Value> {
        (self)(data).await
    }
}

/// `{from, to, event, guard?}` (spec §3). `from = "*"` matches any current
/// state (spec §8 invariant 3).
pub struct Transition {
    pub from: String,
    pub to: String,
    pub event: String,
    pub guard: Option<Arc<dyn Guard>>,
}

impl Transition {
    pub fn new(from: impl Into<String>, event: impl Into<String>, to: impl Into<String>) -> Self {
        Self { from: from.into(), event: event.into(), to: to.into(), guard: None }
    }

    pub fn with_guard(mut self, guard: Arc<dyn Guard>) -> Self {
        self.guard = Some(guard);
        self
    }

    fn matches(&self, from: &str, event: &str) -> bool {
        (self.from == "*" || self.from == from) && self.event == event
    }
}

/// `{type, version, initialState, states, finalStates, transitions,
/// entryActions?, exitActions?}` (spec §3). Immutable once registered.
pub struct ProcessDefinition {
    pub process_type: String,
    pub version: u32,
    pub initial_state: String,
    pub states: HashSet<String>,
    pub final_states: HashSet<String>,
    pub transitions: Vec<Transition>,
    pub entry_actions: HashMap<String, Arc<dyn ProcessAction>>,
    pub exit_actions: HashMap<String, Arc<dyn ProcessAction>>,
}

impl ProcessDefinition {
    pub fn new(
        process_type: impl Into<String>,
        version: u32,
        initial_state: impl Into<String>,
        states: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            process_type: process_type.into(),
            version,
            initial_state: initial_state.into(),
            states: states.into_iter().collect(),
            final_states: HashSet::new(),
            transitions: Vec::new(),
            entry_actions: HashMap::new(),
            exit_actions: HashMap::new(),
        }
    }

    pub fn with_transitions(mut self, transitions: Vec<Transition>) -> Self {
        self.transitions = transitions;
        self
    }

    pub fn with_final_states(mut self, states: impl IntoIterator<Item = String>) -> Self {
        self.final_states = states.into_iter().collect();
        self
    }

    pub fn with_entry_action(mut self, state: impl Into<String>, action: Arc<dyn ProcessAction>) -> Self {
        self.entry_actions.insert(state.into(), action);
        self
    }

    pub fn with_exit_action(mut self, state: impl Into<String>, action: Arc<dyn ProcessAction>) -> Self {
        self.exit_actions.insert(state.into(), action);
        self
    }

    /// The transition matching `(from=state, event=eventType)`, if any
    /// (spec §4.5, §8 invariant 3).
    pub fn find_transition(&self, from: &str, event: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.matches(from, event))
    }
}

/// Read-only lookup of registered process definitions by `(type, version)`.
#[derive(Default)]
pub struct ProcessRegistry {
    definitions: RwLock<HashMap<(String, u32), Arc<ProcessDefinition>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, definition: ProcessDefinition) {
        let key = (definition.process_type.clone(), definition.version);
        self.definitions.write().insert(key, Arc::new(definition));
    }

    pub fn get(&self, process_type: &str, version: u32) -> Result<Arc<ProcessDefinition>> {
        self.definitions
            .read()
            .get(&(process_type.to_string(), version))
            .cloned()
            .ok_or_else(|| DomainError::not_found("process_definition", format!("{process_type}@{version}")))
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
