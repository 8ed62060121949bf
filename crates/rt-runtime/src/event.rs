// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain events flowing through the event bus.
//!
//! Payloads are dynamically typed: rather than threading a generic
//! `DomainEvent<P>` through every hook and subscriber signature, this crate
//! settles on `serde_json::Value` as the tagged dynamic value at hook
//! boundaries. [`Event`] is the monomorphic alias every component actually
//! passes around.

use rt_core::define_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

define_id! {
    /// Unique identifier for a published event. Unique across the lifetime
    /// of the event bus that produced it.
    pub struct EventId("evt-");
}

define_id! {
    /// Unique identifier for a subscription returned by `subscribe`.
    pub struct SubscriptionId("sub-");
}

/// Conventional metadata key under which a correlation id lives.
pub const CORRELATION_ID_KEY: &str = "correlationId";

/// An event published on the bus. Generic over payload type `P` so the type
/// can be reused for other payload representations; [`Event`] fixes
/// `P = serde_json::Value`, which is what every component in this crate
/// actually works with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<P = Value> {
    pub id: EventId,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: u64,
    pub payload: P,
    pub metadata: Option<HashMap<String, Value>>,
}

/// The concrete event type passed through the bus, extension system, and
/// task/process components.
pub type Event = DomainEvent<Value>;

impl DomainEvent<Value> {
    /// Construct a new event with a fresh id and no metadata.
    pub fn new(event_type: impl Into<String>, timestamp: u64, payload: Value) -> Self {
        Self { id: EventId::new(), event_type: event_type.into(), timestamp, payload, metadata: None }
    }

    /// Attach a correlation id under the conventional metadata key.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(CORRELATION_ID_KEY.to_string(), Value::String(correlation_id.into()));
        self
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata.as_ref()?.get(CORRELATION_ID_KEY)?.as_str()
    }

    /// Returns a clone of this event with `payload` replaced, preserving
    /// `id`, `event_type`, `timestamp`, and `metadata` verbatim — what a
    /// pre-publish hook rewrite must uphold.
    pub fn with_payload(&self, payload: Value) -> Self {
        Self { payload, ..self.clone() }
    }
}

/// What a subscriber is listening for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscribedType {
    Type(String),
    Wildcard,
}

impl SubscribedType {
    pub fn parse(event_type: &str) -> Self {
        if event_type == "*" {
            Self::Wildcard
        } else {
            Self::Type(event_type.to_string())
        }
    }

    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Type(t) => t == event_type,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
