//! Extension registration and unregistration.
//!
//! # Invariants
//! - At most one record per id.
//! - A new record starts `inactive` and its context is seeded with the
//!   manifest's activation events before listeners run.
//! - Unregistration deactivates first, then releases subscriptions, then
//!   removes record and context.

use super::context::{ExtensionContextData, RegisterOptions};
use super::manifest::ExtensionManifest;
use super::record::Extension;
use crate::host::{ExtensionHost, HostError, HostResult, LifecycleEvent, WeakHost};
use log::info;
use std::cell::Cell;
use std::rc::Rc;

/// Returned by registration; [`ExtensionHandle::dispose`] unregisters.
pub struct ExtensionHandle {
    host: WeakHost,
    id: String,
    disposed: Cell<bool>,
}

impl ExtensionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Unregisters the extension. Later calls do nothing.
    pub async fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(host) = self.host.upgrade() {
            // Already gone is fine here.
            let _ = host.unregister_extension(&self.id).await;
        }
    }
}

impl ExtensionHost {
    /// Registers `manifest` and notifies registration listeners, which
    /// process its contributions against every known point.
    pub fn register_extension(
        &self,
        manifest: ExtensionManifest,
        options: RegisterOptions,
    ) -> HostResult<ExtensionHandle> {
        manifest.validate()?;
        let manifest = Rc::new(manifest);
        let record = Extension::new(Rc::clone(&manifest));
        let id = record.id.clone();
        let (path_resolver, module) = options.into_parts();
        let context = ExtensionContextData::new(&manifest, path_resolver, module);

        {
            let mut store = self.inner.store.borrow_mut();
            if store.extensions.contains(&id) {
                return Err(HostError::DuplicateExtension(id));
            }
            store.extensions.set(id.clone(), record.clone());
            store.contexts.set(id.clone(), context);
        }
        info!(
            "event=extension_register module=registry status=ok extension_id={} dependencies={} contributes={}",
            id,
            manifest.extension_dependencies.len(),
            manifest.contributes.len()
        );

        self.notify(LifecycleEvent::Registered, &record);
        Ok(ExtensionHandle {
            host: self.downgrade(),
            id,
            disposed: Cell::new(false),
        })
    }

    /// Parses a JSON manifest and registers it.
    pub fn register_extension_json(
        &self,
        raw: &str,
        options: RegisterOptions,
    ) -> HostResult<ExtensionHandle> {
        let manifest = ExtensionManifest::from_json_str(raw)?;
        self.register_extension(manifest, options)
    }

    /// Removes `id`: waits for a running activation (unless called from
    /// inside it), deactivates, releases subscriptions and drops record and
    /// context.
    pub async fn unregister_extension(&self, id: &str) -> HostResult<()> {
        let record = self
            .get_extension(id)
            .ok_or_else(|| HostError::ExtensionNotFound(id.to_string()))?;
        self.notify(LifecycleEvent::WillUnregister, &record);

        if let Some(pending) = self.awaitable_activation(id) {
            pending.await;
        }
        self.deactivate_extension(id).await?;
        let released = self.release_subscriptions(id);

        let removed = {
            let mut store = self.inner.store.borrow_mut();
            store.contexts.delete(&id.to_string());
            store.extensions.delete(&id.to_string())
        };
        info!(
            "event=extension_unregister module=registry status=ok extension_id={} subscriptions_released={}",
            id, released
        );
        if let Some(record) = removed {
            self.notify(LifecycleEvent::Unregistered, &record);
        }
        Ok(())
    }
}
