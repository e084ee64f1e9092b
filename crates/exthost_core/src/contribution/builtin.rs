//! Built-in contribution points: `commands`, `keybindings`, `menus`, `views`.
//!
//! Each point pairs a JSON schema with a transform into the typed
//! [`Contribution`] variant. `when` strings are compiled here, once, through
//! the shared clause compiler.

use super::keybinding::normalize_key;
use super::kinds::{
    CommandContribution, Contribution, KeybindingContribution, MenuItemContribution,
    ViewContribution,
};
use super::point::ContributionPoint;
use super::ContributionProcessError;
use crate::disposable::Disposable;
use crate::host::{ExtensionHost, HostResult};
use crate::when::{compile_when_clause, WhenClause};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const COMMANDS_POINT: &str = "commands";
pub const KEYBINDINGS_POINT: &str = "keybindings";
pub const MENUS_POINT: &str = "menus";
pub const VIEWS_POINT: &str = "views";

/// Registers every built-in point. Disposing the result unregisters them.
pub fn register_builtin_points(host: &ExtensionHost) -> HostResult<Disposable> {
    let mut registered = Vec::new();
    for point in builtin_points() {
        match host.register_contribution_point(point) {
            Ok(disposable) => registered.push(disposable),
            Err(err) => {
                Disposable::from_all(registered).dispose();
                return Err(err);
            }
        }
    }
    Ok(Disposable::from_all(registered))
}

pub fn builtin_points() -> Vec<ContributionPoint> {
    vec![
        commands_point(),
        keybindings_point(),
        menus_point(),
        views_point(),
    ]
}

pub fn commands_point() -> ContributionPoint {
    ContributionPoint::new(COMMANDS_POINT)
        .with_processor(
            json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["command", "title"],
                    "properties": {
                        "command": { "type": "string", "minLength": 1 },
                        "title": { "type": "string", "minLength": 1 },
                        "category": { "type": "string" },
                        "icon": { "type": "string" },
                        "enablement": { "type": "string" }
                    }
                }
            }),
            process_commands,
        )
        .with_code_info(Some("command"), Some("onCommand:${id}"))
}

pub fn keybindings_point() -> ContributionPoint {
    ContributionPoint::new(KEYBINDINGS_POINT).with_processor(
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "required": ["command", "key"],
                "properties": {
                    "command": { "type": "string", "minLength": 1 },
                    "key": { "type": "string", "minLength": 1 },
                    "mac": { "type": "string" },
                    "when": { "type": "string" },
                    "args": {}
                },
                "additionalProperties": false
            }
        }),
        process_keybindings,
    )
}

pub fn menus_point() -> ContributionPoint {
    ContributionPoint::new(MENUS_POINT).with_processor(
        json!({
            "type": "object",
            "additionalProperties": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["command"],
                    "properties": {
                        "command": { "type": "string", "minLength": 1 },
                        "group": { "type": "string" },
                        "when": { "type": "string" }
                    }
                }
            }
        }),
        process_menus,
    )
}

pub fn views_point() -> ContributionPoint {
    ContributionPoint::new(VIEWS_POINT)
        .with_processor(
            json!({
                "type": "object",
                "additionalProperties": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["id", "name"],
                        "properties": {
                            "id": { "type": "string", "pattern": "^[A-Za-z0-9_.\\-]+$" },
                            "name": { "type": "string", "minLength": 1 },
                            "when": { "type": "string" }
                        }
                    }
                }
            }),
            process_views,
        )
        .with_code_info(None, Some("onView:${id}"))
}

#[derive(Deserialize)]
struct RawCommand {
    command: String,
    title: String,
    category: Option<String>,
    icon: Option<String>,
    enablement: Option<String>,
}

#[derive(Deserialize)]
struct RawKeybinding {
    command: String,
    key: String,
    mac: Option<String>,
    when: Option<String>,
    args: Option<JsonValue>,
}

#[derive(Deserialize)]
struct RawMenuItem {
    command: String,
    group: Option<String>,
    when: Option<String>,
}

#[derive(Deserialize)]
struct RawView {
    id: String,
    name: String,
    when: Option<String>,
}

fn compile_optional(
    clause: Option<String>,
) -> Result<Option<Arc<WhenClause>>, ContributionProcessError> {
    match clause.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(Some(compile_when_clause(text)?)),
        _ => Ok(None),
    }
}

fn process_commands(value: &JsonValue) -> Result<Contribution, ContributionProcessError> {
    let raw: Vec<RawCommand> = serde_json::from_value(value.clone())?;
    let mut commands = Vec::with_capacity(raw.len());
    for item in raw {
        commands.push(CommandContribution {
            command: item.command,
            title: item.title,
            category: item.category,
            icon: item.icon,
            enablement: compile_optional(item.enablement)?,
        });
    }
    Ok(Contribution::Commands(commands))
}

fn process_keybindings(value: &JsonValue) -> Result<Contribution, ContributionProcessError> {
    let raw: Vec<RawKeybinding> = serde_json::from_value(value.clone())?;
    let mut bindings = Vec::with_capacity(raw.len());
    for item in raw {
        let mac = match item.mac.as_deref() {
            Some(mac) => Some(normalize_key(mac)?),
            None => None,
        };
        bindings.push(KeybindingContribution {
            command: item.command,
            key: normalize_key(&item.key)?,
            mac,
            when: compile_optional(item.when)?,
            args: item.args,
        });
    }
    Ok(Contribution::Keybindings(bindings))
}

fn process_menus(value: &JsonValue) -> Result<Contribution, ContributionProcessError> {
    let raw: BTreeMap<String, Vec<RawMenuItem>> = serde_json::from_value(value.clone())?;
    let mut menus = BTreeMap::new();
    for (menu, items) in raw {
        let mut processed = Vec::with_capacity(items.len());
        for item in items {
            processed.push(MenuItemContribution {
                command: item.command,
                group: item.group,
                when: compile_optional(item.when)?,
            });
        }
        menus.insert(menu, processed);
    }
    Ok(Contribution::Menus(menus))
}

fn process_views(value: &JsonValue) -> Result<Contribution, ContributionProcessError> {
    let raw: BTreeMap<String, Vec<RawView>> = serde_json::from_value(value.clone())?;
    let mut containers = BTreeMap::new();
    for (container, views) in raw {
        let mut processed = Vec::with_capacity(views.len());
        for view in views {
            processed.push(ViewContribution {
                id: view.id,
                name: view.name,
                when: compile_optional(view.when)?,
            });
        }
        containers.insert(container, processed);
    }
    Ok(Contribution::Views(containers))
}

#[cfg(test)]
mod tests {
    use super::{commands_point, keybindings_point, menus_point, views_point};
    use crate::contribution::kinds::{CommandContribution, Contribution};
    use crate::contribution::point::ContributionPoint;
    use crate::contribution::schema::validate;
    use crate::when::{compile_when_clause, ContextMap, Value};
    use serde_json::json;
    use std::sync::Arc;

    fn process(point: ContributionPoint, value: serde_json::Value) -> Contribution {
        let info = point.manifest_info.expect("builtin points read manifests");
        validate(&info.schema, &value).expect("payload matches schema");
        let process = info.process_entry.expect("builtin points transform");
        process(&value).expect("payload transforms")
    }

    #[test]
    fn commands_become_typed_entries() {
        let contribution = process(
            commands_point(),
            json!([{ "command": "x.run", "title": "Run", "enablement": "editorFocus" }]),
        );
        let commands = contribution.as_commands().expect("commands variant");
        assert_eq!(commands[0].command, "x.run");
        let clause = commands[0].enablement.as_ref().expect("enablement compiled");
        assert!(Arc::ptr_eq(
            clause,
            &compile_when_clause("editorFocus").expect("compiles")
        ));

        let plain = process(commands_point(), json!([{ "command": "x.run", "title": "Run" }]));
        assert_eq!(
            plain,
            Contribution::Commands(vec![CommandContribution::new("x.run", "Run")])
        );
    }

    #[test]
    fn keybindings_are_normalized() {
        let contribution = process(
            keybindings_point(),
            json!([{ "command": "x.run", "key": "Alt+Ctrl+J", "mac": "Cmd+J", "when": "editorFocus" }]),
        );
        let bindings = contribution.as_keybindings().expect("keybindings variant");
        assert_eq!(bindings[0].key, "ctrl+alt+j");
        assert_eq!(bindings[0].mac.as_deref(), Some("meta+j"));

        let mut context = ContextMap::new();
        context.insert("editorFocus".to_string(), Value::Bool(true));
        assert!(bindings[0].is_active(&context));
    }

    #[test]
    fn menu_items_gate_on_when_clauses() {
        let contribution = process(
            menus_point(),
            json!({ "view/title": [{ "command": "x.refresh", "when": "view == dataSources" }] }),
        );
        let menus = contribution.as_menus().expect("menus variant");
        let item = &menus["view/title"][0];

        let mut context = ContextMap::new();
        assert!(!item.is_visible(&context));
        context.insert("view".to_string(), Value::from("dataSources"));
        assert!(item.is_visible(&context));
    }

    #[test]
    fn views_are_grouped_by_container() {
        let contribution = process(
            views_point(),
            json!({ "explorer": [{ "id": "dataSources", "name": "Data Sources" }] }),
        );
        assert_eq!(contribution.entry_count(), 1);
        let views = contribution.as_views().expect("views variant");
        assert_eq!(views["explorer"][0].id, "dataSources");
        assert!(views["explorer"][0].is_visible(&ContextMap::new()));
    }

    #[test]
    fn malformed_when_clause_fails_processing() {
        let point = menus_point();
        let info = point.manifest_info.expect("manifest info");
        let process = info.process_entry.expect("transform");
        let err = process(&json!({ "m": [{ "command": "c", "when": "a == 'open" }] }))
            .expect_err("unterminated string");
        assert!(err.message().contains("invalid when clause"));
    }
}
