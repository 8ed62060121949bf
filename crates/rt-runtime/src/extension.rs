// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Extension system (C1): named extension points dispatching ordered,
//! fail-fast hooks that may rewrite their params.
//!
//! Priority is an integer; higher executes first, ties break by
//! registration order. This gives every other component (event bus, task
//! executor, process manager) a predictable algebra for transforming event
//! payloads and task inputs without racing.

use async_trait::async_trait;
use parking_lot::RwLock;
use rt_core::{DomainError, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A single hook registered against an extension point.
///
/// Implemented directly for any `Fn(Value) -> Fut` closure via the blanket
/// impl below, so callers rarely need to name this trait.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, params: Value) -> Result<Value>;
}

#[async_trait]
impl<F, Fut> Hook for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn call(&self, params: Value) -> Result<Value> {
        (self)(params).await
    }
}

/// One hook an [`Extension`] contributes, naming the point and priority it
/// registers against.
pub struct HookRegistration {
    pub point: String,
    pub priority: i32,
    pub hook: Arc<dyn Hook>,
}

impl HookRegistration {
    pub fn new(point: impl Into<String>, priority: i32, hook: Arc<dyn Hook>) -> Self {
        Self { point: point.into(), priority, hook }
    }
}

/// A named, independently registerable bundle of hooks.
pub trait Extension: Send + Sync {
    fn id(&self) -> &str;
    fn hooks(&self) -> Vec<HookRegistration>;
}

struct Entry {
    extension_id: String,
    priority: i32,
    seq: u64,
    hook: Arc<dyn Hook>,
}

/// Read-only summary of one registered hook, for health/debug introspection;
/// not part of the dispatch algebra itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSummary {
    pub extension_id: String,
    pub priority: i32,
}

#[derive(Default)]
struct State {
    points: HashSet<String>,
    entries: HashMap<String, Vec<Entry>>,
    registered_extensions: HashSet<String>,
}

/// Central registry of extension points and the hooks dispatched through
/// them.
pub struct ExtensionSystem {
    state: RwLock<State>,
    seq: AtomicU64,
}

impl ExtensionSystem {
    pub fn new() -> Self {
        Self { state: RwLock::new(State::default()), seq: AtomicU64::new(0) }
    }

    /// Idempotent: registering an already-known point is a no-op.
    pub fn register_extension_point(&self, name: impl Into<String>) {
        self.state.write().points.insert(name.into());
    }

    /// Register every hook the extension contributes. Fails with
    /// `AlreadyExists` if `ext.id()` is already registered; no hooks are
    /// added in that case.
    pub fn register_extension(&self, ext: Arc<dyn Extension>) -> Result<()> {
        let id = ext.id().to_string();
        let mut state = self.state.write();
        if state.registered_extensions.contains(&id) {
            return Err(DomainError::already_exists("extension", id));
        }
        state.registered_extensions.insert(id.clone());
        for reg in ext.hooks() {
            state.points.insert(reg.point.clone());
            let seq = self.seq.fetch_add(1, Ordering::SeqCst);
            let entries = state.entries.entry(reg.point).or_default();
            entries.push(Entry { extension_id: id.clone(), priority: reg.priority, seq, hook: reg.hook });
            // Higher priority first; ties keep registration order (seq ascending).
            entries.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        }
        Ok(())
    }

    /// Remove every hook the named extension contributed. Idempotent on an
    /// unknown id only in the sense that it reports `NotFound`; callers
    /// that don't care can ignore the error.
    pub fn unregister_extension(&self, id: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.registered_extensions.remove(id) {
            return Err(DomainError::not_found("extension", id));
        }
        for entries in state.entries.values_mut() {
            entries.retain(|e| e.extension_id != id);
        }
        Ok(())
    }

    /// Sequentially invoke every hook registered at `point` with the
    /// current params, fail-fast. An unregistered/empty point is a no-op
    /// returning `params` unchanged.
    pub async fn execute_extension_point(&self, point: &str, params: Value) -> Result<Value> {
        let hooks: Vec<Arc<dyn Hook>> = {
            let state = self.state.read();
            match state.entries.get(point) {
                Some(entries) => entries.iter().map(|e| e.hook.clone()).collect(),
                None => Vec::new(),
            }
        };
        let mut current = params;
        for hook in hooks {
            current = hook.call(current).await?;
        }
        Ok(current)
    }

    pub fn registered_points(&self) -> Vec<String> {
        let state = self.state.read();
        let mut points: Vec<String> = state.points.iter().cloned().collect();
        points.sort();
        points
    }

    pub fn hooks_for(&self, point: &str) -> Vec<HookSummary> {
        let state = self.state.read();
        state
            .entries
            .get(point)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| HookSummary { extension_id: e.extension_id.clone(), priority: e.priority })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for ExtensionSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "extension_tests.rs"]
mod tests;
