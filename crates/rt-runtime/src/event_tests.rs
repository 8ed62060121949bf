// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn new_event_has_unique_id() {
    let a = Event::new("task.completed", 1, json!({}));
    let b = Event::new("task.completed", 1, json!({}));
    assert_ne!(a.id, b.id);
}

#[test]
fn with_payload_preserves_id_type_timestamp_metadata() {
    let event = Event::new("t", 42, json!({"original": true})).with_correlation_id("corr-1");
    let rewritten = event.with_payload(json!({"original": true, "intercepted": true}));

    assert_eq!(rewritten.id, event.id);
    assert_eq!(rewritten.event_type, event.event_type);
    assert_eq!(rewritten.timestamp, event.timestamp);
    assert_eq!(rewritten.correlation_id(), Some("corr-1"));
    assert_eq!(rewritten.payload, json!({"original": true, "intercepted": true}));
}

#[test]
fn correlation_id_absent_by_default() {
    let event = Event::new("t", 1, json!(null));
    assert_eq!(event.correlation_id(), None);
}

#[test]
fn subscribed_type_wildcard_matches_everything() {
    let sub = SubscribedType::parse("*");
    assert_eq!(sub, SubscribedType::Wildcard);
    assert!(sub.matches("task.completed"));
    assert!(sub.matches("anything"));
}

#[test]
fn subscribed_type_exact_match_only() {
    let sub = SubscribedType::parse("task.completed");
    assert!(sub.matches("task.completed"));
    assert!(!sub.matches("task.failed"));
}
