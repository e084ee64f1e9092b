//! Activation state machine.
//!
//! # Responsibility
//! - Drive `inactive → loading → activating → active` and
//!   `active → deactivating → inactive`, rejecting on any failure.
//! - Activate dependencies first, in declaration order, one at a time.
//! - Fan activation events out to every subscribed extension.
//!
//! # Invariants
//! - One activation runs per extension at a time. Public callers that find
//!   it in flight get the current record back; dependents await it unless
//!   the call comes from inside that activation.
//! - Lifecycle failures land in `reasons`, never in the returned `Result`.
//! - Extensions on a dependency cycle are rejected before any dependency
//!   is touched.
//! - No store borrow is held across an `.await`.

use crate::extension::context::ExtensionContext;
use crate::extension::error::ExtensionError;
use crate::extension::manifest::ExtensionManifest;
use crate::extension::record::{Exports, Extension, ExtensionStatus};
use crate::host::{ExtensionHost, HostError, HostResult, PendingActivation};
use futures::future::{join_all, poll_fn};
use futures::FutureExt;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

impl ExtensionHost {
    /// Activates `id` and returns the resulting record.
    ///
    /// Returns `Err` only for an unknown id. A record that is not
    /// `inactive` (including one whose activation is in flight) is returned
    /// as-is, so extension code may call back into the host while activating.
    pub async fn activate_extension(&self, id: &str) -> HostResult<Extension> {
        let record = self
            .get_extension(id)
            .ok_or_else(|| HostError::ExtensionNotFound(id.to_string()))?;
        if record.status != ExtensionStatus::Inactive || self.pending_activation(id).is_some() {
            return Ok(record);
        }
        Ok(self.spawn_activation(id).await)
    }

    /// Activates a dependency and waits for it to settle.
    ///
    /// An activation already in flight is awaited unless it is the one being
    /// polled further up this call stack.
    async fn activate_dependency(&self, id: &str) -> HostResult<Extension> {
        let record = self
            .get_extension(id)
            .ok_or_else(|| HostError::ExtensionNotFound(id.to_string()))?;
        if let Some(pending) = self.awaitable_activation(id) {
            return Ok(pending.await);
        }
        if record.status != ExtensionStatus::Inactive || self.pending_activation(id).is_some() {
            debug!(
                "event=extension_activate module=activation status=skipped extension_id={} current_status={}",
                id, record.status
            );
            return Ok(record);
        }
        Ok(self.spawn_activation(id).await)
    }

    /// Activates every extension listening to `event` (or `*`), concurrently.
    ///
    /// One extension's failure does not affect the others; the records are
    /// returned in id order.
    pub async fn activate_by_event(&self, event: &str) -> Vec<Extension> {
        let targets: Vec<String> = self
            .inner
            .store
            .borrow()
            .contexts
            .all()
            .iter()
            .filter(|(_, context)| context.listens_to(event))
            .map(|(id, _)| id.clone())
            .collect();
        debug!(
            "event=activation_event module=activation status=start activation_event={} targets={}",
            event,
            targets.len()
        );

        let results = join_all(targets.iter().map(|id| self.activate_extension(id))).await;
        results.into_iter().filter_map(Result::ok).collect()
    }

    /// Deactivates `id` if it is `active`; otherwise returns the record unchanged.
    ///
    /// An extension with a pending rejection ends `rejected`.
    pub async fn deactivate_extension(&self, id: &str) -> HostResult<Extension> {
        let record = self
            .get_extension(id)
            .ok_or_else(|| HostError::ExtensionNotFound(id.to_string()))?;
        if record.status != ExtensionStatus::Active {
            return Ok(record);
        }

        let record = self.advance(id, &record, |ext| ext.status = ExtensionStatus::Deactivating);
        let module = self.extension_context(id).and_then(|context| context.module);
        let outcome = match module {
            Some(module) => {
                let context = ExtensionContext::new(self.downgrade(), id, record.manifest.clone());
                module.deactivate(&context).await
            }
            None => Ok(()),
        };
        self.release_subscriptions(id);

        let record = match outcome {
            Ok(()) => {
                info!(
                    "event=extension_deactivate module=activation status=ok extension_id={} rejection_pending={}",
                    id, record.rejection_pending
                );
                self.advance(id, &record, |ext| {
                    if ext.rejection_pending {
                        ext.reject(Vec::new());
                    } else {
                        ext.status = ExtensionStatus::Inactive;
                        ext.exports = None;
                    }
                })
            }
            Err(err) => self.fail(
                id,
                &record,
                ExtensionError::Deactivation {
                    extension: id.to_string(),
                    message: err.to_string(),
                },
            ),
        };
        Ok(record)
    }

    /// Moves a `rejected` extension back to `inactive` so it can be activated again.
    /// Reasons are kept.
    pub fn reset_extension(&self, id: &str) -> HostResult<Extension> {
        let record = self
            .get_extension(id)
            .ok_or_else(|| HostError::ExtensionNotFound(id.to_string()))?;
        if record.status != ExtensionStatus::Rejected {
            return Ok(record);
        }
        Ok(self.advance(id, &record, |ext| ext.status = ExtensionStatus::Inactive))
    }

    pub(crate) fn pending_activation(&self, id: &str) -> Option<PendingActivation> {
        self.inner.pending.borrow().get(id).cloned()
    }

    /// The in-flight activation of `id`, unless it is being polled further up
    /// this call stack; awaiting it from there would never complete.
    pub(crate) fn awaitable_activation(&self, id: &str) -> Option<PendingActivation> {
        if self.inner.polling.borrow().contains(id) {
            return None;
        }
        self.pending_activation(id)
    }

    fn spawn_activation(&self, id: &str) -> PendingActivation {
        let host = self.clone();
        let key = id.to_string();
        let mut run = async move {
            let record = host.run_activation(&key).await;
            host.inner.pending.borrow_mut().remove(&key);
            record
        }
        .boxed_local();
        // `polling` names the activations on the current call stack.
        let host = self.clone();
        let key = id.to_string();
        let task = poll_fn(move |cx| {
            host.inner.polling.borrow_mut().insert(key.clone());
            let poll = run.as_mut().poll(cx);
            host.inner.polling.borrow_mut().remove(&key);
            poll
        })
        .boxed_local()
        .shared();
        self.inner
            .pending
            .borrow_mut()
            .insert(id.to_string(), task.clone());
        task
    }

    async fn run_activation(&self, id: &str) -> Extension {
        let Some(record) = self.get_extension(id) else {
            return self.missing_record(id);
        };
        debug!(
            "event=extension_activate module=activation status=start extension_id={}",
            id
        );

        if let Some(cycle) = self.find_dependency_cycle(id) {
            return self.fail(
                id,
                &record,
                ExtensionError::DependencyCycle {
                    extension: id.to_string(),
                    cycle,
                },
            );
        }

        let mut dependency_exports: Vec<Option<Exports>> = Vec::new();
        let mut failed: Vec<String> = Vec::new();
        let mut upstream: Vec<ExtensionError> = Vec::new();
        for dependency in &record.manifest.extension_dependencies {
            match self.activate_dependency(dependency).await {
                Ok(dep) if dep.status == ExtensionStatus::Active => {
                    dependency_exports.push(dep.exports.clone());
                }
                Ok(dep) => {
                    failed.push(dependency.clone());
                    upstream.extend(dep.reasons.iter().cloned());
                }
                Err(_) => {
                    failed.push(dependency.clone());
                    upstream.push(ExtensionError::DependencyMissing {
                        extension: id.to_string(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }
        if !failed.is_empty() {
            let mut reasons = vec![ExtensionError::DependencyFailed {
                extension: id.to_string(),
                dependencies: failed,
            }];
            reasons.extend(upstream);
            return self.fail_with(id, &record, reasons);
        }

        let Some(context) = self.extension_context(id) else {
            return self.missing_record(id);
        };
        let mut module = context.module;
        let mut record = record;
        if module.is_none() {
            if let Some(main) = record.manifest.main.clone() {
                record = self.advance(id, &record, |ext| ext.status = ExtensionStatus::Loading);
                let path = self.resolve_extension_path(id, &main);
                match self.inner.loader.load_module(&path).await {
                    Ok(loaded) => {
                        let stored = loaded.clone();
                        let stored_path = path.clone();
                        self.update_context(id, move |context| {
                            context.module = Some(stored);
                            context.module_path = Some(stored_path);
                        });
                        module = Some(loaded);
                    }
                    Err(err) => {
                        return self.fail(
                            id,
                            &record,
                            ExtensionError::ModuleLoad {
                                extension: id.to_string(),
                                path: path.display().to_string(),
                                message: err.to_string(),
                            },
                        );
                    }
                }
            }
        }

        let record = self.advance(id, &record, |ext| ext.status = ExtensionStatus::Activating);
        let exports = match module {
            Some(module) => {
                let context = ExtensionContext::new(self.downgrade(), id, record.manifest.clone());
                match module.activate(&context, dependency_exports).await {
                    Ok(exports) => exports,
                    Err(err) => {
                        return self.fail(
                            id,
                            &record,
                            ExtensionError::Activation {
                                extension: id.to_string(),
                                message: err.to_string(),
                            },
                        );
                    }
                }
            }
            None => None,
        };

        info!(
            "event=extension_activate module=activation status=ok extension_id={} has_exports={}",
            id,
            exports.is_some()
        );
        self.advance(id, &record, move |ext| {
            ext.status = ExtensionStatus::Active;
            ext.exports = exports;
        })
    }

    /// Applies `change` to the stored record, or to `fallback` when the
    /// extension has been removed meanwhile.
    fn advance(
        &self,
        id: &str,
        fallback: &Extension,
        change: impl FnOnce(&mut Extension),
    ) -> Extension {
        let key = id.to_string();
        let mut store = self.inner.store.borrow_mut();
        let registered = store.extensions.contains(&key);
        let mut record = store
            .extensions
            .get(&key)
            .unwrap_or_else(|| fallback.clone());
        change(&mut record);
        if registered {
            store.extensions.set(key, record.clone());
        }
        record
    }

    fn fail(&self, id: &str, fallback: &Extension, reason: ExtensionError) -> Extension {
        self.fail_with(id, fallback, vec![reason])
    }

    fn fail_with(&self, id: &str, fallback: &Extension, reasons: Vec<ExtensionError>) -> Extension {
        for reason in &reasons {
            warn!(
                "event=extension_reject module=activation status=error extension_id={} kind={} reason={}",
                id,
                reason.kind(),
                reason
            );
        }
        self.advance(id, fallback, move |ext| ext.reject(reasons))
    }

    fn missing_record(&self, id: &str) -> Extension {
        // Removed between scheduling and running.
        let mut record = Extension::new(Rc::new(ExtensionManifest::default()));
        record.id = id.to_string();
        record.reject(vec![ExtensionError::Activation {
            extension: id.to_string(),
            message: "extension was unregistered".to_string(),
        }]);
        record
    }

    fn find_dependency_cycle(&self, id: &str) -> Option<Vec<String>> {
        dependency_cycle(&self.extensions(), id)
    }
}

/// A dependency path from `origin` back to itself, if one exists.
pub(crate) fn dependency_cycle(
    extensions: &BTreeMap<String, Extension>,
    origin: &str,
) -> Option<Vec<String>> {
    let mut path = vec![origin.to_string()];
    let mut visited = BTreeSet::new();
    walk_dependencies(extensions, origin, &mut path, &mut visited).then_some(path)
}

fn walk_dependencies(
    extensions: &BTreeMap<String, Extension>,
    origin: &str,
    path: &mut Vec<String>,
    visited: &mut BTreeSet<String>,
) -> bool {
    let Some(current) = path.last().and_then(|last| extensions.get(last)) else {
        return false;
    };
    let dependencies = current.manifest.extension_dependencies.clone();
    for dependency in dependencies {
        if dependency == origin {
            path.push(dependency);
            return true;
        }
        if !visited.insert(dependency.clone()) {
            continue;
        }
        path.push(dependency);
        if walk_dependencies(extensions, origin, path, visited) {
            return true;
        }
        path.pop();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::dependency_cycle;
    use crate::extension::manifest::ExtensionManifest;
    use crate::extension::record::Extension;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    /// `("a", "b,c")`: `t.a` depends on `t.b` then `t.c`.
    fn extensions(edges: &[(&str, &str)]) -> BTreeMap<String, Extension> {
        edges
            .iter()
            .map(|(name, deps)| {
                let mut manifest = ExtensionManifest::new("t", *name);
                manifest.extension_dependencies = deps
                    .split(',')
                    .filter(|dep| !dep.is_empty())
                    .map(|dep| format!("t.{dep}"))
                    .collect();
                let record = Extension::new(Rc::new(manifest));
                (record.id.clone(), record)
            })
            .collect()
    }

    #[test]
    fn finds_cycle_through_origin() {
        let graph = extensions(&[("a", "b"), ("b", "c"), ("c", "a")]);
        assert_eq!(
            dependency_cycle(&graph, "t.a"),
            Some(vec![
                "t.a".to_string(),
                "t.b".to_string(),
                "t.c".to_string(),
                "t.a".to_string()
            ])
        );
    }

    #[test]
    fn ignores_cycles_the_origin_is_not_part_of() {
        let graph = extensions(&[("a", "b"), ("b", "c"), ("c", "b")]);
        assert_eq!(dependency_cycle(&graph, "t.a"), None);
        assert!(dependency_cycle(&graph, "t.b").is_some());
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let graph = extensions(&[("a", "b,c"), ("b", "d"), ("c", "d"), ("d", "")]);
        assert_eq!(dependency_cycle(&graph, "t.a"), None);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let graph = extensions(&[("a", "a")]);
        assert_eq!(
            dependency_cycle(&graph, "t.a"),
            Some(vec!["t.a".to_string(), "t.a".to_string()])
        );
    }
}
