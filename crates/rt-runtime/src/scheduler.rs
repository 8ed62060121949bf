// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task scheduler (C5): holds future task executions keyed by an absolute
//! due time and hands each to the task executor once it is due.
//!
//! Exposes two interfaces over the same entry table: a deterministic
//! [`Scheduler::tick`] that a test drives directly against a [`rt_core::FakeClock`],
//! and [`Scheduler::run`], a real async driver loop that sleeps until the
//! next due time (or is woken early by a new, earlier schedule) and fires
//! entries through a [`crate::task::executor::TaskExecutor`].

use parking_lot::Mutex;
use rt_core::{define_id, Clock};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

define_id! {
    /// Identifies one scheduled (not-yet-fired) task execution.
    pub struct ScheduleId("sch-");
}

struct Entry {
    id: ScheduleId,
    task_type: String,
    input: Value,
    scheduled_time_ms: u64,
    seq: u64,
}

/// A scheduled entry that has become due, handed back by [`Scheduler::tick`].
pub struct DueTask {
    pub id: ScheduleId,
    pub task_type: String,
    pub input: Value,
}

#[derive(Default)]
struct State {
    entries: Vec<Entry>,
}

pub struct Scheduler {
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    seq: AtomicU64,
    wake: Notify,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, state: Mutex::new(State::default()), seq: AtomicU64::new(0), wake: Notify::new() }
    }

    /// Enqueue a task to fire at `scheduled_time_ms` (absolute, per the
    /// scheduler's clock). Wakes the real driver if this is now the
    /// earliest pending entry.
    pub fn schedule(&self, task_type: impl Into<String>, input: Value, scheduled_time_ms: u64) -> ScheduleId {
        let id = ScheduleId::new();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            state.entries.push(Entry { id, task_type: task_type.into(), input, scheduled_time_ms, seq });
            state.entries.sort_by(|a, b| a.scheduled_time_ms.cmp(&b.scheduled_time_ms).then(a.seq.cmp(&b.seq)));
        }
        self.wake.notify_one();
        id
    }

    /// Remove a pending entry. A no-op if it has already fired or never
    /// existed — scheduling is fire-and-forget, not a registry.
    pub fn cancel_scheduled_task(&self, id: ScheduleId) {
        self.state.lock().entries.retain(|e| e.id != id);
        self.wake.notify_one();
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Pop every entry due at or before `now_ms`, in `(scheduled_time, seq)`
    /// order. The deterministic interface: a test calls this directly
    /// after advancing a `FakeClock`, with no async driver involved.
    pub fn tick(&self, now_ms: u64) -> Vec<DueTask> {
        let mut state = self.state.lock();
        let mut due = Vec::new();
        state.entries.retain(|e| {
            if e.scheduled_time_ms <= now_ms {
                due.push(DueTask { id: e.id, task_type: e.task_type.clone(), input: e.input.clone() });
                false
            } else {
                true
            }
        });
        due
    }

    fn next_due_ms(&self) -> Option<u64> {
        self.state.lock().entries.first().map(|e| e.scheduled_time_ms)
    }

    /// Real driver loop: sleeps until the next due time (or indefinitely if
    /// the table is empty), fires everything due via `on_due`, and repeats.
    /// Returns once `cancel` resolves; runs until then. Uses the scheduler's
    /// own clock for epoch-ms due-time comparisons but real `tokio::time`
    /// sleeps, so it wakes at approximately the right wall-clock moment
    /// even though due times are expressed against the injectable clock.
    pub async fn run<F, Fut>(&self, cancel: rt_core::CancellationToken, mut on_due: F)
    where
        F: FnMut(DueTask) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        loop {
            if cancel.is_cancelled() {
                return;
            }
            let now = self.clock.epoch_ms();
            match self.next_due_ms() {
                Some(due_ms) if due_ms <= now => {
                    for task in self.tick(now) {
                        on_due(task).await;
                    }
                }
                Some(due_ms) => {
                    let wait = std::time::Duration::from_millis(due_ms.saturating_sub(now));
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = self.wake.notified() => {}
                        _ = cancel_signal(&cancel) => return,
                    }
                }
                None => {
                    tokio::select! {
                        _ = self.wake.notified() => {}
                        _ = cancel_signal(&cancel) => return,
                    }
                }
            }
        }
    }
}

/// Resolves once `token` is cancelled (immediately, if already cancelled).
async fn cancel_signal(token: &rt_core::CancellationToken) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    token.on_cancel(move || {
        let _ = tx.send(());
    });
    let _ = rx.await;
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
