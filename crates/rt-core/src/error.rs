// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by every component.
//!
//! One variant per error kind the spec distinguishes, each carrying the
//! context a caller needs to act on it rather than a bare message. `kind()`
//! returns a stable tag usable for `retryableErrorTypes` matching (see
//! [`crate::resilience::retry`]) and for `system:error` hook payloads,
//! without callers having to pattern-match or parse `Display` output.

use thiserror::Error;

/// The result type returned by every fallible core operation.
pub type Result<T> = std::result::Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("validation failed: {message}")]
    ValidationError { message: String },

    #[error("no transition from state {from:?} on event {event:?}")]
    NoTransition { from: String, event: String },

    #[error("guard rejected transition on event {event:?}")]
    GuardFailed { event: String },

    #[error("checkpoint {checkpoint_id} is not owned by process {process_id}")]
    NotOwned { checkpoint_id: String, process_id: String },

    #[error("circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("dependency {dependency_id} did not complete successfully")]
    DependencyFailed { dependency_id: String },

    #[error("execution {execution_id} exceeded its {elapsed_ms}ms deadline")]
    Timeout { execution_id: String, elapsed_ms: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("hook {extension_id} failed at {point}: {message}")]
    HookFailed { extension_id: String, point: String, message: String },

    #[error("internal invariant violated: {message}")]
    Internal { message: String },

    /// A handler-thrown failure that does not map onto a more specific kind.
    #[error("{message}")]
    Handler { kind_tag: String, message: String },
}

impl DomainError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    pub fn already_exists(kind: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists { kind, id: id.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError { message: message.into() }
    }

    pub fn handler(kind_tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler { kind_tag: kind_tag.into(), message: message.into() }
    }

    /// Stable tag for this error kind, used to match against
    /// `RetryPolicy::retryable_error_types` and in hook payloads.
    pub fn kind(&self) -> &str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::ValidationError { .. } => "validation_error",
            Self::NoTransition { .. } => "no_transition",
            Self::GuardFailed { .. } => "guard_failed",
            Self::NotOwned { .. } => "not_owned",
            Self::CircularDependency { .. } => "circular_dependency",
            Self::DependencyFailed { .. } => "dependency_failed",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::CircuitOpen => "circuit_open",
            Self::HookFailed { .. } => "hook_failed",
            Self::Internal { .. } => "internal",
            Self::Handler { kind_tag, .. } => kind_tag.as_str(),
        }
    }

    /// Whether this error kind is ever eligible for retry, independent of
    /// any policy's `retryable_error_types` allowlist. Cancellation and
    /// circular-dependency failures are never retried (spec §4.3).
    pub fn is_retry_eligible(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::CircularDependency { .. })
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
