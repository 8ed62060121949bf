// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker (C7): `closed -> open -> half_open -> closed` gate over
//! an arbitrary fallible operation (spec §4.6).

use parking_lot::Mutex;
use rt_core::{Clock, DomainError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerOptions {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_success_threshold: u32,
}

struct Inner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_epoch_ms: Option<u64>,
}

pub struct CircuitBreaker {
    clock: Arc<dyn Clock>,
    options: CircuitBreakerOptions,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>, options: CircuitBreakerOptions) -> Self {
        Self {
            clock,
            options,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_epoch_ms: None,
            }),
        }
    }

    /// Current state, arming the `open -> half_open` transition if
    /// `reset_timeout` has elapsed since the last failure.
    pub fn state(&self) -> CircuitState {
        self.maybe_arm_half_open();
        self.inner.lock().state
    }

    /// Unconditional return to `closed` (spec §4.6).
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.success_count = 0;
        inner.last_failure_epoch_ms = None;
    }

    /// Run `f` through the gate. Rejects with `CircuitOpen` without
    /// invoking `f` while open.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.maybe_arm_half_open();
        if self.inner.lock().state == CircuitState::Open {
            return Err(DomainError::CircuitOpen);
        }
        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }

    fn maybe_arm_half_open(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return;
        }
        if let Some(last) = inner.last_failure_epoch_ms {
            let elapsed = self.clock.epoch_ms().saturating_sub(last);
            if elapsed >= self.options.reset_timeout.as_millis() as u64 {
                inner.state = CircuitState::HalfOpen;
                inner.success_count = 0;
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.failure_count = 0,
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.options.half_open_success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.success_count = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.options.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.last_failure_epoch_ms = Some(self.clock.epoch_ms());
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.last_failure_epoch_ms = Some(self.clock.epoch_ms());
                inner.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
#[path = "circuit_breaker_tests.rs"]
mod tests;
