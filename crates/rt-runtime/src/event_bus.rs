// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus (C2): fans published events out to subscribers and typed
//! extension hooks, with per-type backpressure admission.
//!
//! Ordering (spec §5): for a single subscriber and a single event type,
//! events arrive in publish order. A single `publish` call runs all
//! pre-publish hooks and the full subscriber fan-out to completion before
//! returning to its caller — delivery across *different* events is
//! concurrent, but is awaited serially within one publish.

use crate::event::{Event, SubscribedType, SubscriptionId};
use crate::extension::ExtensionSystem;
use async_trait::async_trait;
use parking_lot::RwLock;
use rt_core::{Clock, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// A subscriber callback, invoked with the (possibly hook-rewritten)
/// payload. Errors are logged and never propagated to the publisher or to
/// other subscribers (spec §4.2).
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn handle(&self, payload: Value) -> Result<()>;
}

#[async_trait]
impl<F, Fut> Subscriber for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<()>> + Send,
{
    async fn handle(&self, payload: Value) -> Result<()> {
        (self)(payload).await
    }
}

/// An optional collaborator that persists published events (spec §6).
/// The core ships an in-memory reference adapter in `rt-storage`; this
/// crate only consumes the trait, never implements durability itself
/// (Non-goals, spec §1).
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn store_event(&self, event: &Event);
}

/// A live subscription. `unsubscribe` is idempotent: calling it twice, or
/// after the bus has been dropped, is a no-op.
pub struct Subscription {
    id: SubscriptionId,
    subscribed: SubscribedType,
    bus: Weak<Inner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(&self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.remove_subscriber(&self.subscribed, self.id);
        }
    }
}

struct SubEntry {
    id: SubscriptionId,
    handler: Arc<dyn Subscriber>,
}

struct Inner {
    clock: Arc<dyn Clock>,
    extensions: Arc<ExtensionSystem>,
    by_type: RwLock<HashMap<String, Vec<SubEntry>>>,
    wildcard: RwLock<Vec<SubEntry>>,
    backpressure: RwLock<HashMap<String, Arc<dyn crate::backpressure::BackpressurePolicy>>>,
    in_flight: RwLock<HashMap<String, Arc<AtomicU64>>>,
    store: RwLock<Option<Arc<dyn EventStore>>>,
}

impl Inner {
    fn remove_subscriber(&self, subscribed: &SubscribedType, id: SubscriptionId) {
        match subscribed {
            SubscribedType::Wildcard => self.wildcard.write().retain(|e| e.id != id),
            SubscribedType::Type(t) => {
                if let Some(entries) = self.by_type.write().get_mut(t) {
                    entries.retain(|e| e.id != id);
                }
            }
        }
    }

    fn in_flight_counter(&self, event_type: &str) -> Arc<AtomicU64> {
        if let Some(c) = self.in_flight.read().get(event_type) {
            return c.clone();
        }
        self.in_flight.write().entry(event_type.to_string()).or_insert_with(|| Arc::new(AtomicU64::new(0))).clone()
    }
}

/// Publishes events, applies pre/post-publish hooks, and fans out to
/// subscribers.
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    pub fn new(clock: Arc<dyn Clock>, extensions: Arc<ExtensionSystem>) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock,
                extensions,
                by_type: RwLock::new(HashMap::new()),
                wildcard: RwLock::new(Vec::new()),
                backpressure: RwLock::new(HashMap::new()),
                in_flight: RwLock::new(HashMap::new()),
                store: RwLock::new(None),
            }),
        }
    }

    /// Attach an optional storage collaborator; replaces any previous one.
    pub fn attach_store(&self, store: Arc<dyn EventStore>) {
        *self.inner.store.write() = Some(store);
    }

    pub fn set_backpressure(&self, event_type: impl Into<String>, policy: Arc<dyn crate::backpressure::BackpressurePolicy>) {
        self.inner.backpressure.write().insert(event_type.into(), policy);
    }

    /// `*` subscribes to every event type. Multiple subscriptions per
    /// handler are permitted; subscribers for the same type are invoked
    /// in registration order.
    pub fn subscribe(&self, event_type: &str, handler: Arc<dyn Subscriber>) -> Subscription {
        let subscribed = SubscribedType::parse(event_type);
        let id = SubscriptionId::new();
        let entry = SubEntry { id, handler };
        match &subscribed {
            SubscribedType::Wildcard => self.inner.wildcard.write().push(entry),
            SubscribedType::Type(t) => self.inner.by_type.write().entry(t.clone()).or_default().push(entry),
        }
        Subscription { id, subscribed, bus: Arc::downgrade(&self.inner) }
    }

    pub fn clear_subscriptions(&self, event_type: &str) {
        self.inner.by_type.write().remove(event_type);
    }

    pub fn clear_all_subscriptions(&self) {
        self.inner.by_type.write().clear();
        self.inner.wildcard.write().clear();
    }

    /// Convenience constructor + publish: builds an [`Event`] stamped with
    /// the bus's clock and publishes it.
    pub async fn publish(&self, event_type: &str, payload: Value) -> Result<Event> {
        let event = Event::new(event_type, self.inner.clock.epoch_ms(), payload);
        self.publish_event(event).await
    }

    /// Publish an already-constructed event. Returns the event as actually
    /// delivered (payload possibly rewritten by `event:beforePublish`).
    pub async fn publish_event(&self, mut event: Event) -> Result<Event> {
        let event_type = event.event_type.clone();

        // 1. Backpressure: advisory delay only, never drops (spec §4.2 step 1).
        let counter = self.inner.in_flight_counter(&event_type);
        if let Some(policy) = self.inner.backpressure.read().get(&event_type).cloned() {
            let current = counter.load(Ordering::SeqCst);
            if !policy.should_accept(current) {
                let delay = policy.calculate_delay(current);
                tracing::warn!(event_type = %event_type, delay_ms = delay.as_millis() as u64, "backpressure delay before admission");
                tokio::time::sleep(delay).await;
            }
        }
        counter.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard { counter: counter.clone() };

        // 2. event:beforePublish — failure rejects the publish outright.
        let hook_params = json!({"eventType": event_type, "payload": event.payload});
        let rewritten = self
            .inner
            .extensions
            .execute_extension_point("event:beforePublish", hook_params)
            .await?;
        if let Some(payload) = rewritten.get("payload") {
            event.payload = payload.clone();
        }

        tracing::info!(event_id = %event.id, event_type = %event_type, "publishing event");

        // 3. Fan-out: subscribers are independent, registration order.
        let subscribers: Vec<Arc<dyn Subscriber>> = {
            let by_type = self.inner.by_type.read();
            let wildcard = self.inner.wildcard.read();
            by_type
                .get(&event_type)
                .into_iter()
                .flatten()
                .chain(wildcard.iter())
                .map(|e| e.handler.clone())
                .collect()
        };
        for subscriber in subscribers {
            if let Err(err) = subscriber.handle(event.payload.clone()).await {
                tracing::warn!(event_id = %event.id, event_type = %event_type, error = %err, "subscriber failed");
            }
        }

        if let Some(store) = self.inner.store.read().clone() {
            store.store_event(&event).await;
        }

        // 4. event:afterPublish — logged but swallowed (spec §4.2 step 4).
        let after_params = json!({
            "eventId": event.id,
            "eventType": event_type,
            "payload": event.payload,
        });
        if let Err(err) = self.inner.extensions.execute_extension_point("event:afterPublish", after_params).await {
            tracing::warn!(event_id = %event.id, error = %err, "event:afterPublish hook failed");
        }

        Ok(event)
    }
}

/// Decrements the in-flight counter when fan-out (and hook execution)
/// completes, even on early return via `?`.
struct InFlightGuard {
    counter: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
