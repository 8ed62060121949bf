// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rt_core::{CancellationToken, FakeClock};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[test]
fn tick_fires_only_entries_due_at_or_before_now() {
    let clock = Arc::new(FakeClock::new());
    let scheduler = Scheduler::new(clock.clone());
    let base = clock.epoch_ms();
    scheduler.schedule("early", json!({}), base + 10);
    scheduler.schedule("late", json!({}), base + 100);

    let due = scheduler.tick(base + 10);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].task_type, "early");
    assert_eq!(scheduler.pending_count(), 1);

    let due = scheduler.tick(base + 100);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].task_type, "late");
    assert_eq!(scheduler.pending_count(), 0);
}

#[test]
fn tick_fires_in_scheduled_time_then_registration_order() {
    let clock = Arc::new(FakeClock::new());
    let scheduler = Scheduler::new(clock.clone());
    let base = clock.epoch_ms();
    scheduler.schedule("b", json!({}), base);
    scheduler.schedule("a", json!({}), base);

    let due = scheduler.tick(base);
    let names: Vec<&str> = due.iter().map(|d| d.task_type.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);
}

#[test]
fn cancel_before_firing_removes_the_entry() {
    let clock = Arc::new(FakeClock::new());
    let scheduler = Scheduler::new(clock.clone());
    let base = clock.epoch_ms();
    let id = scheduler.schedule("cancel_me", json!({}), base + 50);
    scheduler.cancel_scheduled_task(id);
    assert_eq!(scheduler.tick(base + 50).len(), 0);
}

#[test]
fn cancel_after_firing_is_a_no_op() {
    let clock = Arc::new(FakeClock::new());
    let scheduler = Scheduler::new(clock.clone());
    let base = clock.epoch_ms();
    let id = scheduler.schedule("fires", json!({}), base);
    assert_eq!(scheduler.tick(base).len(), 1);
    scheduler.cancel_scheduled_task(id);
    assert_eq!(scheduler.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn real_driver_fires_already_due_entries_and_stops_on_cancel() {
    // Schedules an already-due entry so the driver fires it on its first
    // pass with no timer race, then blocks on `wake`/`cancel` with nothing
    // pending — exercising the no-timer-interleaving path deterministically.
    let clock = Arc::new(FakeClock::new());
    let scheduler = Arc::new(Scheduler::new(clock.clone()));
    let base = clock.epoch_ms();
    scheduler.schedule("immediate", json!({}), base);

    let fired = Arc::new(AtomicUsize::new(0));
    let fired2 = fired.clone();
    let cancel = CancellationToken::new();
    let cancel2 = cancel.clone();
    let scheduler2 = scheduler.clone();

    let handle = tokio::spawn(async move {
        scheduler2
            .run(cancel2, |_due| {
                let fired = fired2.clone();
                async move {
                    fired.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await;
    });

    // Let the spawned driver run until it blocks waiting for the next wake.
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.pending_count(), 0);

    cancel.cancel();
    handle.await.unwrap();
}
