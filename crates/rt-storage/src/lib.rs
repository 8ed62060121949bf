// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! In-memory reference implementation of the event bus's optional storage
//! collaborator (§10.5). Bounded, non-persistent, and lost on process
//! exit — a reference for tests and small deployments, not a durability
//! guarantee (Non-goals, §1).

use async_trait::async_trait;
use parking_lot::RwLock;
use rt_runtime::{Event, EventStore};
use std::collections::HashMap;
use std::ops::Range;

/// Caps the number of events retained; the oldest entries are evicted once
/// exceeded, so a long-running process doesn't grow this store unbounded.
pub const DEFAULT_CAPACITY: usize = 10_000;

struct State {
    events: Vec<Event>,
    by_type: HashMap<String, Vec<usize>>,
    by_correlation_id: HashMap<String, Vec<usize>>,
    capacity: usize,
}

impl State {
    fn evict_if_over_capacity(&mut self) {
        while self.events.len() > self.capacity {
            self.events.remove(0);
            self.reindex();
        }
    }

    fn reindex(&mut self) {
        self.by_type.clear();
        self.by_correlation_id.clear();
        for (idx, event) in self.events.iter().enumerate() {
            self.by_type.entry(event.event_type.clone()).or_default().push(idx);
            if let Some(correlation_id) = event.correlation_id() {
                self.by_correlation_id.entry(correlation_id.to_string()).or_default().push(idx);
            }
        }
    }
}

/// An in-process, non-persistent store of published events, indexed by
/// `type` and by `metadata.correlationId`, with range queries on
/// `timestamp`.
pub struct InMemoryEventStore {
    state: RwLock<State>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { state: RwLock::new(State { events: Vec::new(), by_type: HashMap::new(), by_correlation_id: HashMap::new(), capacity }) }
    }

    pub fn len(&self) -> usize {
        self.state.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn by_type(&self, event_type: &str) -> Vec<Event> {
        let state = self.state.read();
        state
            .by_type
            .get(event_type)
            .into_iter()
            .flatten()
            .filter_map(|&idx| state.events.get(idx).cloned())
            .collect()
    }

    pub fn by_correlation_id(&self, correlation_id: &str) -> Vec<Event> {
        let state = self.state.read();
        state
            .by_correlation_id
            .get(correlation_id)
            .into_iter()
            .flatten()
            .filter_map(|&idx| state.events.get(idx).cloned())
            .collect()
    }

    /// Events whose `timestamp` falls within `range` (`start` inclusive,
    /// `end` exclusive), in publish order.
    pub fn by_timestamp_range(&self, range: Range<u64>) -> Vec<Event> {
        self.state.read().events.iter().filter(|e| range.contains(&e.timestamp)).cloned().collect()
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn store_event(&self, event: &Event) {
        let mut state = self.state.write();
        let idx = state.events.len();
        state.events.push(event.clone());
        state.by_type.entry(event.event_type.clone()).or_default().push(idx);
        if let Some(correlation_id) = event.correlation_id() {
            state.by_correlation_id.entry(correlation_id.to_string()).or_default().push(idx);
        }
        state.evict_if_over_capacity();
        tracing::debug!(event_id = %event.id, event_type = %event.event_type, "stored event in memory");
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
