// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry policy and backoff algebra (spec §4.3, §4.7).
//!
//! The same `delay_for_attempt` computation backs both the task executor's
//! internal retry loop and the standalone [`RetryPolicy::execute`] wrapper
//! handlers can reach for directly, so the two never drift.

use rt_core::{DomainError, Result};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    Exponential,
}

/// `{maxAttempts, backoffStrategy, initialDelay, maxDelay, retryableErrorTypes}`
/// from spec §4.3. An empty `retryable_error_types` means every
/// retry-eligible error kind is retryable.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub retryable_error_types: Vec<String>,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Fixed,
            initial_delay: delay,
            max_delay: delay,
            retryable_error_types: Vec::new(),
        }
    }

    /// Delay before attempt `n+1`, where `n` is the attempt that just
    /// failed (1-indexed, per spec §4.3). Always `<= max_delay`, including
    /// after jitter (spec §8 round-trip property).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = match self.backoff {
            BackoffStrategy::Fixed => self.initial_delay.as_millis() as u64,
            BackoffStrategy::Linear => self.initial_delay.as_millis() as u64 * attempt as u64,
            BackoffStrategy::Exponential => {
                self.initial_delay.as_millis() as u64 * 2u64.saturating_pow(attempt.saturating_sub(1))
            }
        };
        let capped_ms = base_ms.min(self.max_delay.as_millis() as u64);
        // +-10% jitter, clamped back under the cap so the testable property
        // "delay <= maxDelay for all n" holds even after jittering up.
        let jitter = 1.0 + (fastrand::f64() * 0.2 - 0.1);
        let jittered_ms = ((capped_ms as f64) * jitter).round().max(0.0) as u64;
        Duration::from_millis(jittered_ms.min(self.max_delay.as_millis() as u64))
    }

    /// An error is retryable iff its kind is ever retry-eligible
    /// (`Cancelled`/`CircularDependency` never are) and either the
    /// allowlist is empty or it names this error's kind/tag.
    pub fn is_retryable(&self, error: &DomainError) -> bool {
        if !error.is_retry_eligible() {
            return false;
        }
        self.retryable_error_types.is_empty()
            || self.retryable_error_types.iter().any(|t| t == error.kind())
    }

    /// Standalone retry wrapper (spec §4.7), independent of the task
    /// executor's internal loop — used by handlers that want retry
    /// semantics the executor doesn't manage. `should_retry` lets the
    /// caller narrow eligibility beyond `retryable_error_types`.
    pub async fn execute<F, Fut, T>(&self, mut f: F, should_retry: impl Fn(&DomainError) -> bool) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match f(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_attempts || !self.is_retryable(&err) || !should_retry(&err) {
                        return Err(err);
                    }
                    tokio::time::sleep(self.delay_for_attempt(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
