use exthost_core::contribution::builtin::{commands_point, COMMANDS_POINT, VIEWS_POINT};
use exthost_core::contribution::CommandContribution;
use exthost_core::{
    normalize_key, register_builtin_points, Contribution, ContributionPoint, ExtensionError,
    ExtensionHost, ExtensionManifest, ExtensionStatus, HostError, RegisterOptions, Value,
};
use serde_json::json;
use std::collections::BTreeSet;

fn host_with_builtins() -> ExtensionHost {
    let host = ExtensionHost::default();
    // Dropping the handle keeps the points registered.
    let _points = register_builtin_points(&host).expect("builtin points register");
    host
}

fn register(host: &ExtensionHost, manifest: serde_json::Value) -> String {
    let manifest = ExtensionManifest::from_json_value(manifest).expect("manifest parses");
    host.register_extension(manifest, RegisterOptions::new())
        .expect("registration succeeds")
        .id()
        .to_string()
}

#[test]
fn commands_scenario_derives_events_and_stores_validated_array() {
    let host = ExtensionHost::default();
    let _point = host
        .register_contribution_point(commands_point())
        .expect("point registers");

    let id = register(
        &host,
        json!({
            "provider": "acme",
            "name": "x",
            "contributes": { "commands": [{ "command": "x.run", "title": "Run" }] }
        }),
    );

    let context = host.extension_context(&id).expect("context exists");
    assert_eq!(
        context.activation_events,
        BTreeSet::from(["onCommand:x.run".to_string()])
    );
    assert_eq!(
        context.contributions.get(COMMANDS_POINT),
        Some(&Contribution::Commands(vec![CommandContribution::new(
            "x.run", "Run"
        )]))
    );
    assert_eq!(
        host.get_extension(&id).expect("record").status,
        ExtensionStatus::Inactive
    );
}

#[test]
fn schema_violation_rejects_only_the_offending_point() {
    let host = host_with_builtins();
    let id = register(
        &host,
        json!({
            "provider": "acme",
            "name": "broken",
            "contributes": {
                "commands": [{ "command": "x.run" }],
                "views": { "explorer": [{ "id": "dataSources", "name": "Data Sources" }] }
            }
        }),
    );

    let record = host.get_extension(&id).expect("record");
    assert_eq!(record.status, ExtensionStatus::Rejected);
    assert_eq!(record.reasons.len(), 1);
    match &record.reasons[0] {
        ExtensionError::ContributionValidation {
            point,
            extension,
            path,
            message,
        } => {
            assert_eq!(point, COMMANDS_POINT);
            assert_eq!(extension, "acme.broken");
            assert_eq!(path, "$[0]");
            assert!(message.contains("'title'"));
        }
        other => panic!("unexpected reason: {other}"),
    }

    let context = host.extension_context(&id).expect("context");
    assert!(!context.contributions.contains_key(COMMANDS_POINT));
    assert!(context.contributions.contains_key(VIEWS_POINT));
    assert!(context.activation_events.contains("onView:dataSources"));
}

#[test]
fn transform_failure_is_recorded_as_processing_error() {
    let host = host_with_builtins();
    let id = register(
        &host,
        json!({
            "provider": "acme",
            "name": "keys",
            "contributes": { "keybindings": [{ "command": "x.run", "key": "ctrl+shift" }] }
        }),
    );
    let record = host.get_extension(&id).expect("record");
    assert!(record.is_rejected());
    assert!(matches!(
        record.reasons[0],
        ExtensionError::ContributionProcessing { .. }
    ));
}

#[test]
fn keybindings_are_stored_normalized() {
    assert_eq!(normalize_key("Alt+Ctrl+J").expect("valid key"), "ctrl+alt+j");

    let host = host_with_builtins();
    let id = register(
        &host,
        json!({
            "provider": "acme",
            "name": "keys",
            "contributes": {
                "keybindings": [{ "command": "x.run", "key": "Alt+Ctrl+J", "when": "editorFocus" }]
            }
        }),
    );
    let contribution = host
        .extension_context(&id)
        .and_then(|context| context.contributions.get("keybindings").cloned())
        .expect("keybindings processed");
    let bindings = contribution.as_keybindings().expect("keybinding variant");
    assert_eq!(bindings[0].key, "ctrl+alt+j");
    assert_eq!(
        bindings[0].when.as_ref().map(|clause| clause.source()),
        Some("editorFocus")
    );
}

#[test]
fn views_are_gated_by_the_framework_context() {
    let host = host_with_builtins();
    register(
        &host,
        json!({
            "provider": "acme",
            "name": "data",
            "contributes": {
                "views": {
                    "explorer": [
                        { "id": "dataSources", "name": "Data Sources", "when": "view == dataSources" },
                        { "id": "always", "name": "Always" }
                    ]
                }
            }
        }),
    );

    let visible = |host: &ExtensionHost| -> Vec<String> {
        let context = host.framework_context();
        host.contributions_for(VIEWS_POINT)
            .into_iter()
            .flat_map(|(_, contribution)| {
                contribution
                    .as_views()
                    .map(|containers| containers.values().flatten().cloned().collect::<Vec<_>>())
                    .unwrap_or_default()
            })
            .filter(|view| view.is_visible(&context))
            .map(|view| view.id)
            .collect()
    };

    assert_eq!(visible(&host), vec!["always".to_string()]);
    host.update_framework_context([("view", Value::from("dataSources"))]);
    assert_eq!(
        visible(&host),
        vec!["dataSources".to_string(), "always".to_string()]
    );
}

#[test]
fn point_registered_after_extension_still_processes_it() {
    let host = ExtensionHost::default();
    let id = register(
        &host,
        json!({
            "provider": "acme",
            "name": "late",
            "contributes": { "commands": [{ "command": "late.run", "title": "Late" }] }
        }),
    );
    assert!(host
        .extension_context(&id)
        .expect("context")
        .contributions
        .is_empty());

    let point = host
        .register_contribution_point(commands_point())
        .expect("point registers");
    let context = host.extension_context(&id).expect("context");
    assert!(context.contributions.contains_key(COMMANDS_POINT));
    assert!(context.activation_events.contains("onCommand:late.run"));

    point.dispose();
    assert!(host.contribution_point(COMMANDS_POINT).is_none());
    assert!(host
        .extension_context(&id)
        .expect("context")
        .contributions
        .is_empty());
}

#[test]
fn custom_points_store_raw_payloads_and_literal_events() {
    let host = ExtensionHost::default();
    let _themes = host
        .register_contribution_point(
            ContributionPoint::new("themes")
                .with_schema(json!({ "type": "array", "items": { "type": "object", "required": ["label"] } }))
                .with_code_info(None, Some("onThemes")),
        )
        .expect("point registers");

    let id = register(
        &host,
        json!({
            "provider": "acme",
            "name": "themes",
            "contributes": { "themes": [{ "label": "Dark" }, { "label": "Light" }] }
        }),
    );
    let quiet = register(&host, json!({ "provider": "acme", "name": "quiet" }));

    let context = host.extension_context(&id).expect("context");
    assert_eq!(
        context.contributions.get("themes"),
        Some(&Contribution::Raw(json!([{ "label": "Dark" }, { "label": "Light" }])))
    );
    assert_eq!(
        context.activation_events,
        BTreeSet::from(["onThemes".to_string()])
    );
    assert!(host
        .extension_context(&quiet)
        .expect("context")
        .activation_events
        .is_empty());
}

#[test]
fn duplicate_point_ids_are_rejected() {
    let host = host_with_builtins();
    let err = host
        .register_contribution_point(ContributionPoint::new(COMMANDS_POINT))
        .err()
        .expect("duplicate point fails");
    assert_eq!(
        err,
        HostError::DuplicateContributionPoint(COMMANDS_POINT.to_string())
    );
}
