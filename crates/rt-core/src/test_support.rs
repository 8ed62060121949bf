// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::clock::FakeClock;
use std::time::Duration;

/// A [`FakeClock`] pre-advanced past zero so `epoch_ms()` never returns a
/// suspiciously round boundary value in assertions.
pub fn fake_clock() -> FakeClock {
    let clock = FakeClock::new();
    clock.advance(Duration::from_millis(1));
    clock
}

/// Proptest strategies reused by every crate's property tests.
#[cfg(feature = "proptest")]
pub mod strategies {
    use proptest::prelude::*;

    /// Arbitrary positive millisecond durations, bounded to keep
    /// property tests fast (no multi-hour simulated delays).
    pub fn arb_millis() -> impl Strategy<Value = u64> {
        1u64..=60_000
    }

    /// Arbitrary attempt numbers, 1-indexed per the spec's `attemptNumber`.
    pub fn arb_attempt() -> impl Strategy<Value = u32> {
        1u32..=20
    }
}
