// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process manager (C6): in-memory finite-state-machine instances advanced
//! by events, with checkpoint/restore.

use crate::event_bus::EventBus;
use crate::extension::ExtensionSystem;
use crate::registry::ProcessRegistry;
use parking_lot::RwLock;
use rt_core::{define_id, Clock, DomainError, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

define_id! {
    /// Identifies one process instance. Unique within a runtime instance.
    pub struct ProcessId("pin-");
}

define_id! {
    /// Identifies one process checkpoint.
    pub struct CheckpointId("ckp-");
}

/// Populated on an instance that has been restored from a checkpoint.
#[derive(Debug, Clone)]
pub struct RecoveryInfo {
    pub checkpoint_id: CheckpointId,
    pub last_saved_at: u64,
}

/// `{id, type, version, state, data, createdAt, updatedAt, metadata, recovery?}`
/// (spec §3). `state` is always a member of its definition's `states` set.
#[derive(Debug, Clone)]
pub struct ProcessInstance {
    pub id: ProcessId,
    pub process_type: String,
    pub version: u32,
    pub state: String,
    pub data: Value,
    pub created_at: u64,
    pub updated_at: u64,
    pub metadata: HashMap<String, Value>,
    pub recovery: Option<RecoveryInfo>,
}

/// `{id, processId, state, data, createdAt, metadata:{version, processType,
/// originalMetadata}}` (spec §3). Owned by the process manager.
#[derive(Debug, Clone)]
pub struct ProcessCheckpoint {
    pub id: CheckpointId,
    pub process_id: ProcessId,
    pub state: String,
    pub data: Value,
    pub created_at: u64,
    pub version: u32,
    pub process_type: String,
    pub original_metadata: HashMap<String, Value>,
}

pub struct ProcessManager {
    registry: Arc<ProcessRegistry>,
    extensions: Arc<ExtensionSystem>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    instances: RwLock<HashMap<ProcessId, ProcessInstance>>,
    checkpoints: RwLock<HashMap<CheckpointId, ProcessCheckpoint>>,
}

impl ProcessManager {
    pub fn new(registry: Arc<ProcessRegistry>, extensions: Arc<ExtensionSystem>, event_bus: Arc<EventBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            registry,
            extensions,
            event_bus,
            clock,
            instances: RwLock::new(HashMap::new()),
            checkpoints: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, id: ProcessId) -> Result<ProcessInstance> {
        self.instances.read().get(&id).cloned().ok_or_else(|| DomainError::not_found("process", id.to_string()))
    }

    /// Create a process instance in its definition's initial state, running
    /// the initial state's entry action (if any) and the `process:created`
    /// hook before storing and publishing `process.created`.
    pub async fn create_process(
        &self,
        process_type: &str,
        version: u32,
        mut data: Value,
        metadata: HashMap<String, Value>,
    ) -> Result<ProcessInstance> {
        let definition = self.registry.get(process_type, version)?;

        if let Some(entry) = definition.entry_actions.get(&definition.initial_state) {
            data = run_action_leniently(entry.as_ref(), data).await;
        }

        let after = self
            .extensions
            .execute_extension_point("process:created", json!({"processType": process_type, "data": data}))
            .await?;
        if let Some(rewritten) = after.get("data") {
            data = rewritten.clone();
        }

        let now = self.clock.epoch_ms();
        let instance = ProcessInstance {
            id: ProcessId::new(),
            process_type: process_type.to_string(),
            version,
            state: definition.initial_state.clone(),
            data,
            created_at: now,
            updated_at: now,
            metadata,
            recovery: None,
        };
        self.instances.write().insert(instance.id, instance.clone());

        self.event_bus
            .publish(
                "process.created",
                json!({"processId": instance.id.to_string(), "processType": process_type, "state": instance.state}),
            )
            .await?;

        Ok(instance)
    }

    /// Advance a process instance on `event_type`, running the outgoing
    /// state's exit action (subject to the transition's guard), the
    /// incoming state's entry action, and publishing `process.stateChanged`.
    pub async fn apply_event(&self, id: ProcessId, event_type: &str, payload: Value) -> Result<ProcessInstance> {
        let mut instance = self.get(id)?;
        let definition = self.registry.get(&instance.process_type, instance.version)?;

        let transition = definition
            .find_transition(&instance.state, event_type)
            .ok_or_else(|| DomainError::NoTransition { from: instance.state.clone(), event: event_type.to_string() })?;

        if let Some(guard) = &transition.guard {
            if !guard.allows(&instance.data) {
                return Err(DomainError::GuardFailed { event: event_type.to_string() });
            }
        }

        let from = instance.state.clone();
        let to = transition.to.clone();

        let mut data = instance.data.clone();
        if let Some(exit) = definition.exit_actions.get(&from) {
            data = run_action_leniently(exit.as_ref(), data).await;
        }
        if let Some(entry) = definition.entry_actions.get(&to) {
            data = run_action_leniently(entry.as_ref(), data).await;
        }

        let now = self.clock.epoch_ms();
        instance.state = to.clone();
        instance.data = data.clone();
        instance.updated_at = now;
        instance.metadata.insert(
            "lastTransition".to_string(),
            json!({"from": from, "to": to, "event": event_type, "timestamp": now}),
        );
        self.instances.write().insert(id, instance.clone());

        self.event_bus
            .publish(
                "process.stateChanged",
                json!({
                    "processId": id.to_string(),
                    "previousState": from,
                    "currentState": to,
                    "transition": event_type,
                    "data": data,
                }),
            )
            .await?;

        Ok(instance)
    }

    /// Pure lookup: never fails, returns `false` on an unknown process or
    /// definition rather than an error.
    pub fn is_transition_valid(&self, id: ProcessId, event_type: &str) -> bool {
        let Some(instance) = self.instances.read().get(&id).cloned() else {
            return false;
        };
        let Ok(definition) = self.registry.get(&instance.process_type, instance.version) else {
            return false;
        };
        definition.find_transition(&instance.state, event_type).is_some()
    }

    /// Snapshot `(state, data)` into the checkpoint table, recording
    /// `metadata.latestCheckpoint` on the instance.
    pub fn save_checkpoint(&self, id: ProcessId) -> Result<CheckpointId> {
        let mut instances = self.instances.write();
        let instance = instances.get_mut(&id).ok_or_else(|| DomainError::not_found("process", id.to_string()))?;

        let checkpoint = ProcessCheckpoint {
            id: CheckpointId::new(),
            process_id: id,
            state: instance.state.clone(),
            data: instance.data.clone(),
            created_at: self.clock.epoch_ms(),
            version: instance.version,
            process_type: instance.process_type.clone(),
            original_metadata: instance.metadata.clone(),
        };
        let checkpoint_id = checkpoint.id;
        self.checkpoints.write().insert(checkpoint_id, checkpoint);
        instance.metadata.insert("latestCheckpoint".to_string(), Value::String(checkpoint_id.to_string()));
        Ok(checkpoint_id)
    }

    /// Restore `(state, data)` from a checkpoint owned by `id`. Fails with
    /// `NotOwned` if the checkpoint belongs to a different process.
    pub fn restore_from_checkpoint(&self, id: ProcessId, checkpoint_id: CheckpointId) -> Result<ProcessInstance> {
        let checkpoint = self
            .checkpoints
            .read()
            .get(&checkpoint_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("checkpoint", checkpoint_id.to_string()))?;
        if checkpoint.process_id != id {
            return Err(DomainError::NotOwned { checkpoint_id: checkpoint_id.to_string(), process_id: id.to_string() });
        }

        let mut instances = self.instances.write();
        let instance = instances.get_mut(&id).ok_or_else(|| DomainError::not_found("process", id.to_string()))?;

        instance.state = checkpoint.state.clone();
        instance.data = checkpoint.data.clone();
        for (k, v) in &checkpoint.original_metadata {
            instance.metadata.insert(k.clone(), v.clone());
        }
        instance.recovery = Some(RecoveryInfo { checkpoint_id, last_saved_at: checkpoint.created_at });
        instance.metadata.insert("restoredFrom".to_string(), Value::String(checkpoint_id.to_string()));
        instance.metadata.insert("restoredAt".to_string(), json!(self.clock.epoch_ms()));
        instance.updated_at = self.clock.epoch_ms();

        Ok(instance.clone())
    }
}

/// Run an entry/exit action, catching and logging any error rather than
/// aborting the transition (spec §4.5, open question 1): the pre-action
/// `data` is kept unchanged on failure.
async fn run_action_leniently(action: &dyn crate::registry::ProcessAction, data: Value) -> Value {
    match action.run(data.clone()).await {
        Ok(transformed) => transformed,
        Err(err) => {
            tracing::warn!(error = %err, "process action failed, data left unchanged");
            data
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
