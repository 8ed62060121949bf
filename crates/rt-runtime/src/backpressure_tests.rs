// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn accepts_below_threshold() {
    let policy = ThresholdBackpressure::new(3, Duration::from_millis(10));
    assert!(policy.should_accept(0));
    assert!(policy.should_accept(2));
}

#[test]
fn rejects_at_or_above_threshold() {
    let policy = ThresholdBackpressure::new(3, Duration::from_millis(10));
    assert!(!policy.should_accept(3));
    assert!(!policy.should_accept(10));
}

#[test]
fn delay_scales_with_excess_in_flight() {
    let policy = ThresholdBackpressure::new(3, Duration::from_millis(10));
    assert_eq!(policy.calculate_delay(3), Duration::from_millis(10));
    assert_eq!(policy.calculate_delay(5), Duration::from_millis(30));
}
