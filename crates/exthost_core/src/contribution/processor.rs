//! Contribution processing pipeline.
//!
//! # Responsibility
//! - Register and unregister contribution points on the host.
//! - For each (extension, point) pair: validate the manifest payload,
//!   derive activation events, transform and store the result.
//!
//! # Invariants
//! - Runs when an extension registers (for every known point) and when a
//!   point registers (for every known extension); order does not matter.
//! - A failure rejects the extension for that point only; contributions
//!   already stored for other points stay.
//! - Re-processing a point replaces its stored contribution.

use super::kinds::Contribution;
use super::point::{CodeInfo, ContributionPoint};
use super::schema::validate;
use crate::disposable::Disposable;
use crate::extension::error::ExtensionError;
use crate::host::{ExtensionHost, HostError, HostResult};
use log::{debug, info};
use serde_json::Value as JsonValue;
use std::rc::Rc;

impl ExtensionHost {
    /// Registers a contribution point and processes it for every registered
    /// extension. Disposing the result unregisters the point.
    pub fn register_contribution_point(&self, point: ContributionPoint) -> HostResult<Disposable> {
        let id = point.id.trim().to_string();
        if id.is_empty() {
            return Err(HostError::InvalidContributionPoint(point.id));
        }
        let point = Rc::new(ContributionPoint { id: id.clone(), ..point });
        {
            let mut store = self.inner.store.borrow_mut();
            if store.points.contains(&id) {
                return Err(HostError::DuplicateContributionPoint(id));
            }
            store.points.set(id.clone(), Rc::clone(&point));
        }
        info!(
            "event=point_register module=contribution status=ok point_id={}",
            id
        );

        let extension_ids: Vec<String> = self.extensions().keys().cloned().collect();
        for extension_id in &extension_ids {
            process_point(self, &point, extension_id);
        }

        let host = self.downgrade();
        Ok(Disposable::new(move || {
            if let Some(host) = host.upgrade() {
                host.remove_contribution_point(&id, &point);
            }
        }))
    }

    pub fn contribution_point(&self, id: &str) -> Option<Rc<ContributionPoint>> {
        self.inner.store.borrow().points.get(&id.to_string())
    }

    pub fn contribution_points(&self) -> Vec<Rc<ContributionPoint>> {
        self.inner.store.borrow().points.all().values().cloned().collect()
    }

    /// Processed contributions to `point`, by extension id.
    pub fn contributions_for(&self, point: &str) -> Vec<(String, Contribution)> {
        let contexts = self.inner.store.borrow().contexts.all();
        contexts
            .iter()
            .filter_map(|(extension_id, context)| {
                context
                    .contributions
                    .get(point)
                    .map(|contribution| (extension_id.clone(), contribution.clone()))
            })
            .collect()
    }

    fn remove_contribution_point(&self, id: &str, point: &Rc<ContributionPoint>) {
        let key = id.to_string();
        let mut store = self.inner.store.borrow_mut();
        let still_registered = store
            .points
            .get(&key)
            .is_some_and(|current| Rc::ptr_eq(&current, point));
        if !still_registered {
            return;
        }
        store.points.delete(&key);
        let holders: Vec<String> = store
            .contexts
            .all()
            .iter()
            .filter(|(_, context)| context.contributions.contains_key(id))
            .map(|(extension_id, _)| extension_id.clone())
            .collect();
        for extension_id in holders {
            store.contexts.update(&extension_id, |context| {
                context.contributions.remove(id);
            });
        }
        info!(
            "event=point_unregister module=contribution status=ok point_id={}",
            id
        );
    }
}

/// Processes every registered point for one extension.
pub(crate) fn process_extension(host: &ExtensionHost, extension_id: &str) {
    for point in host.contribution_points() {
        process_point(host, &point, extension_id);
    }
}

/// Processes one point for one extension. Points without manifest info and
/// extensions that do not contribute to the point are skipped.
pub(crate) fn process_point(host: &ExtensionHost, point: &ContributionPoint, extension_id: &str) {
    let Some(manifest_info) = point.manifest_info.as_ref() else {
        return;
    };
    let Some(record) = host.get_extension(extension_id) else {
        return;
    };
    let Some(raw) = record.manifest.contributes.get(&point.id) else {
        return;
    };

    if let Err(violation) = validate(&manifest_info.schema, raw) {
        host.reject_extension(
            extension_id,
            vec![ExtensionError::ContributionValidation {
                point: point.id.clone(),
                extension: extension_id.to_string(),
                path: violation.path,
                message: violation.message,
            }],
        );
        return;
    }

    let events = match point.code_info.as_ref() {
        Some(code_info) => match derive_activation_events(code_info, raw) {
            Ok(events) => events,
            Err(message) => {
                host.reject_extension(
                    extension_id,
                    vec![ExtensionError::InvalidContribution {
                        point: point.id.clone(),
                        extension: extension_id.to_string(),
                        message,
                    }],
                );
                return;
            }
        },
        None => Vec::new(),
    };

    let contribution = match manifest_info.process_entry.as_ref() {
        Some(process) => match process(raw) {
            Ok(contribution) => contribution,
            Err(err) => {
                host.reject_extension(
                    extension_id,
                    vec![ExtensionError::ContributionProcessing {
                        point: point.id.clone(),
                        extension: extension_id.to_string(),
                        message: err.to_string(),
                    }],
                );
                return;
            }
        },
        None => Contribution::Raw(raw.clone()),
    };

    let event_count = events.len();
    host.update_context(extension_id, move |context| {
        context.activation_events.extend(events);
        context
            .contributions
            .insert(point.id.clone(), contribution);
    });
    debug!(
        "event=contribution_process module=contribution status=ok extension_id={} point_id={} activation_events={}",
        extension_id, point.id, event_count
    );
}

/// Activation events announced by one payload.
///
/// Ids are read from `code_info.id_key` on array items, on a single object,
/// or on the entries of a keyed map (falling back to the map key for
/// object entries).
pub(crate) fn derive_activation_events(
    code_info: &CodeInfo,
    raw: &JsonValue,
) -> Result<Vec<String>, String> {
    let Some(template) = code_info.activation_event.as_deref() else {
        return Ok(Vec::new());
    };
    if !code_info.has_placeholder() {
        return Ok(vec![template.to_string()]);
    }

    let id_key = code_info.id_key();
    let mut ids = Vec::new();
    match raw {
        JsonValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                ids.push(required_id(item, id_key, &format!("[{index}]"))?);
            }
        }
        JsonValue::Object(map) => {
            if let Some(id) = map.get(id_key).and_then(JsonValue::as_str) {
                ids.push(id.to_string());
            } else {
                for (key, entry) in map {
                    match entry {
                        JsonValue::Array(items) => {
                            for (index, item) in items.iter().enumerate() {
                                ids.push(required_id(item, id_key, &format!("{key}[{index}]"))?);
                            }
                        }
                        JsonValue::Object(object) => ids.push(
                            object
                                .get(id_key)
                                .and_then(JsonValue::as_str)
                                .unwrap_or(key)
                                .to_string(),
                        ),
                        _ => ids.push(key.clone()),
                    }
                }
            }
        }
        _ => return Err("contribution must be an array or an object".to_string()),
    }

    Ok(ids
        .iter()
        .filter_map(|id| code_info.activation_event_for(id))
        .collect())
}

fn required_id(item: &JsonValue, id_key: &str, location: &str) -> Result<String, String> {
    item.get(id_key)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| format!("entry {location} is missing string field '{id_key}'"))
}

#[cfg(test)]
mod tests {
    use super::derive_activation_events;
    use crate::contribution::point::CodeInfo;
    use serde_json::json;

    fn info(id_key: Option<&str>, template: &str) -> CodeInfo {
        CodeInfo {
            id_key: id_key.map(str::to_string),
            activation_event: Some(template.to_string()),
        }
    }

    #[test]
    fn array_items_use_the_id_key() {
        let events = derive_activation_events(
            &info(Some("command"), "onCommand:${id}"),
            &json!([{ "command": "a.one" }, { "command": "a.two" }]),
        )
        .expect("ids present");
        assert_eq!(events, vec!["onCommand:a.one", "onCommand:a.two"]);
    }

    #[test]
    fn keyed_maps_read_nested_ids() {
        let events = derive_activation_events(
            &info(None, "onView:${id}"),
            &json!({ "explorer": [{ "id": "dataSources" }], "panel": { "title": "t" } }),
        )
        .expect("ids present");
        assert_eq!(events, vec!["onView:dataSources", "onView:panel"]);
    }

    #[test]
    fn single_object_uses_its_own_id() {
        let events = derive_activation_events(
            &info(None, "onLanguage:${id}"),
            &json!({ "id": "sql", "aliases": ["SQL"] }),
        )
        .expect("id present");
        assert_eq!(events, vec!["onLanguage:sql"]);
    }

    #[test]
    fn literal_template_is_added_once() {
        let events = derive_activation_events(
            &info(None, "onStartupFinished"),
            &json!([{ "id": "a" }, { "id": "b" }]),
        )
        .expect("no ids needed");
        assert_eq!(events, vec!["onStartupFinished"]);
    }

    #[test]
    fn missing_id_is_reported() {
        let err = derive_activation_events(
            &info(Some("command"), "onCommand:${id}"),
            &json!([{ "title": "no id" }]),
        )
        .expect_err("command field missing");
        assert!(err.contains("'command'"));
    }
}
