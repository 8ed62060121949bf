// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rt_core::DomainError;
use serde_json::json;

struct FnExtension {
    id: String,
    hooks: Vec<(String, i32)>,
}

impl Extension for FnExtension {
    fn id(&self) -> &str {
        &self.id
    }

    fn hooks(&self) -> Vec<HookRegistration> {
        self.hooks
            .iter()
            .map(|(point, priority)| {
                let tag = self.id.clone();
                HookRegistration::new(
                    point.clone(),
                    *priority,
                    Arc::new(move |mut params: Value| {
                        let tag = tag.clone();
                        async move {
                            if let Value::Object(ref mut map) = params {
                                map.entry("order")
                                    .or_insert_with(|| Value::Array(vec![]))
                                    .as_array_mut()
                                    .unwrap()
                                    .push(Value::String(tag));
                            }
                            Ok(params)
                        }
                    }),
                )
            })
            .collect()
    }
}

fn ext(id: &str, hooks: &[(&str, i32)]) -> Arc<dyn Extension> {
    Arc::new(FnExtension {
        id: id.to_string(),
        hooks: hooks.iter().map(|(p, pr)| (p.to_string(), *pr)).collect(),
    })
}

#[tokio::test]
async fn unregistered_point_is_a_no_op() {
    let system = ExtensionSystem::new();
    let params = json!({"a": 1});
    let result = system.execute_extension_point("nothing:here", params.clone()).await.unwrap();
    assert_eq!(result, params);
}

#[tokio::test]
async fn hooks_run_in_priority_order_then_registration_order() {
    let system = ExtensionSystem::new();
    system.register_extension(ext("low", &[("p", 0)])).unwrap();
    system.register_extension(ext("high", &[("p", 10)])).unwrap();
    system.register_extension(ext("mid-a", &[("p", 5)])).unwrap();
    system.register_extension(ext("mid-b", &[("p", 5)])).unwrap();

    let result = system.execute_extension_point("p", json!({"order": []})).await.unwrap();
    assert_eq!(result["order"], json!(["high", "mid-a", "mid-b", "low"]));
}

#[tokio::test]
async fn register_extension_rejects_duplicate_id() {
    let system = ExtensionSystem::new();
    system.register_extension(ext("dup", &[("p", 0)])).unwrap();
    let err = system.register_extension(ext("dup", &[("p", 0)])).unwrap_err();
    assert!(matches!(err, DomainError::AlreadyExists { .. }));
}

#[tokio::test]
async fn unregister_extension_removes_its_hooks() {
    let system = ExtensionSystem::new();
    system.register_extension(ext("a", &[("p", 0)])).unwrap();
    system.register_extension(ext("b", &[("p", 0)])).unwrap();
    system.unregister_extension("a").unwrap();

    let result = system.execute_extension_point("p", json!({"order": []})).await.unwrap();
    assert_eq!(result["order"], json!(["b"]));
}

#[tokio::test]
async fn unregister_unknown_extension_is_not_found() {
    let system = ExtensionSystem::new();
    let err = system.unregister_extension("ghost").unwrap_err();
    assert!(matches!(err, DomainError::NotFound { .. }));
}

#[tokio::test]
async fn failing_hook_halts_remaining_hooks() {
    let system = ExtensionSystem::new();
    system.register_extension(ext("first", &[("p", 10)])).unwrap();
    system
        .register_extension(Arc::new(FailingExtension))
        .unwrap();
    system.register_extension(ext("never-runs", &[("p", 0)])).unwrap();

    let err = system.execute_extension_point("p", json!({"order": []})).await.unwrap_err();
    assert!(matches!(err, DomainError::HookFailed { .. }));
}

struct FailingExtension;
impl Extension for FailingExtension {
    fn id(&self) -> &str {
        "failing"
    }

    fn hooks(&self) -> Vec<HookRegistration> {
        vec![HookRegistration::new(
            "p",
            5,
            Arc::new(|_params: Value| async move {
                Err(DomainError::HookFailed {
                    extension_id: "failing".into(),
                    point: "p".into(),
                    message: "boom".into(),
                })
            }),
        )]
    }
}

#[test]
fn registered_points_lists_points_contributed_by_hooks() {
    let system = ExtensionSystem::new();
    system.register_extension_point("explicit:point");
    system.register_extension(ext("a", &[("implicit:point", 0)])).unwrap();

    let points = system.registered_points();
    assert!(points.contains(&"explicit:point".to_string()));
    assert!(points.contains(&"implicit:point".to_string()));
}

#[test]
fn hooks_for_reports_extension_id_and_priority() {
    let system = ExtensionSystem::new();
    system.register_extension(ext("a", &[("p", 7)])).unwrap();
    let summaries = system.hooks_for("p");
    assert_eq!(summaries, vec![HookSummary { extension_id: "a".into(), priority: 7 }]);
}
