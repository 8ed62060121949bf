// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::event_bus::EventBus;
use crate::extension::ExtensionSystem;
use crate::facade::{Runtime, RuntimeOptions};
use rt_core::FakeClock;
use serde_json::json;
use std::sync::Arc;

/// A fresh `ExtensionSystem` + `EventBus` pair over a `FakeClock`, the
/// combination most component tests in this crate need.
pub fn bus_with_extensions() -> (Arc<FakeClock>, Arc<ExtensionSystem>, Arc<EventBus>) {
    let clock = Arc::new(FakeClock::new());
    let extensions = Arc::new(ExtensionSystem::new());
    let bus = Arc::new(EventBus::new(clock.clone(), extensions.clone()));
    (clock, extensions, bus)
}

/// A `Runtime` already past `initialize()`, for tests that only care about
/// component wiring and not the lifecycle transition itself.
pub async fn initialized_runtime() -> Runtime {
    let runtime = Runtime::new(Arc::new(FakeClock::new()));
    runtime
        .initialize(RuntimeOptions { version: "test".to_string(), config: json!({}) })
        .await
        .expect("initialize never fails against a fresh runtime");
    runtime
}

#[cfg(feature = "proptest")]
pub mod strategies {
    use crate::resilience::BackoffStrategy;
    use proptest::prelude::*;

    pub fn arb_backoff_strategy() -> impl Strategy<Value = BackoffStrategy> {
        prop_oneof![
            Just(BackoffStrategy::Fixed),
            Just(BackoffStrategy::Linear),
            Just(BackoffStrategy::Exponential),
        ]
    }
}
