// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is a thread-safe, one-shot flag plus a callback
//! list, matching the "callback-driven cancellation" shape carried over from
//! the source (spec §9): `cancel()` flips the flag and invokes every
//! registered callback exactly once. A panicking callback is caught so it
//! cannot prevent the remaining callbacks from running; it does not stop
//! `cancel()` from completing.
//!
//! Cascading cancellation (a task cancels its in-flight dependencies,
//! depth-first) is built from the same primitive: [`CancellationToken::link_child`]
//! registers a callback on the parent that cancels the child, so there is no
//! separate "cascade" mechanism to keep in sync.

use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{DomainError, Result};

type Callback = Box<dyn FnOnce() + Send>;

struct Inner {
    cancelled: AtomicBool,
    callbacks: Mutex<Vec<Callback>>,
}

/// A cheaply-cloneable handle to a single cancellation signal.
///
/// All clones observe the same underlying flag; cancelling any clone
/// cancels all of them.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                callbacks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Flip the flag and run every registered callback exactly once.
    /// Idempotent: a second call is a no-op.
    pub fn cancel(&self) {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.inner.callbacks.lock());
        for cb in callbacks {
            let _ = std::panic::catch_unwind(AssertUnwindSafe(cb));
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(DomainError::Cancelled)` if the token has been cancelled.
    pub fn throw_if_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(DomainError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Register a callback to run when this token is cancelled. If the
    /// token is already cancelled, the callback runs immediately.
    pub fn on_cancel(&self, f: impl FnOnce() + Send + 'static) {
        if self.is_cancelled() {
            f();
            return;
        }
        let mut callbacks = self.inner.callbacks.lock();
        // Re-check under the lock: cancel() may have run between the
        // is_cancelled() load above and acquiring the lock.
        if self.is_cancelled() {
            drop(callbacks);
            f();
        } else {
            callbacks.push(Box::new(f));
        }
    }

    /// Make `child` cancel whenever `self` does (depth-first cascade).
    pub fn link_child(&self, child: CancellationToken) {
        self.on_cancel(move || child.cancel());
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "cancellation_tests.rs"]
mod tests;
