//! Extension host runtime.
//!
//! # Responsibility
//! - Own all host state: the store, in-flight activations, listeners, the
//!   module loader and configuration.
//! - Expose registry, contribution, activation and framework-context
//!   operations as methods (implemented across the feature modules).
//!
//! # Invariants
//! - Hosts are independent; nothing here is process-global.
//! - The host is single-threaded (`!Send`). Store borrows never span an
//!   `.await` and never span a listener or disposable callback.
//! - Closures held by the host reference it through [`WeakHost`].

mod error;
mod framework;
pub mod listeners;

pub use error::{HostError, HostResult};
pub use listeners::{ExtensionListener, LifecycleEvent, ListenerError};

use crate::activation::module::{ModuleLoader, StaticModuleLoader};
use crate::config::HostConfig;
use crate::contribution::processor;
use crate::disposable::Disposable;
use crate::extension::context::{ExtensionContext, ExtensionContextData};
use crate::extension::error::ExtensionError;
use crate::extension::record::{Extension, ExtensionStatus};
use crate::store::Store;
use futures::future::{LocalBoxFuture, Shared};
use listeners::{notify_all, ListenerSet};
use log::warn;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

/// Shared handle to an activation in progress.
pub(crate) type PendingActivation = Shared<LocalBoxFuture<'static, Extension>>;

pub(crate) struct HostInner {
    pub(crate) config: HostConfig,
    pub(crate) loader: Rc<dyn ModuleLoader>,
    pub(crate) store: RefCell<Store>,
    pub(crate) pending: RefCell<HashMap<String, PendingActivation>>,
    /// Ids whose activation task is being polled right now.
    pub(crate) polling: RefCell<HashSet<String>>,
    pub(crate) listeners: RefCell<ListenerSet>,
}

/// Cheaply clonable handle to one extension host.
#[derive(Clone)]
pub struct ExtensionHost {
    pub(crate) inner: Rc<HostInner>,
}

/// Non-owning host handle, for callbacks stored inside the host.
#[derive(Clone)]
pub struct WeakHost(Weak<HostInner>);

impl WeakHost {
    pub fn upgrade(&self) -> Option<ExtensionHost> {
        self.0.upgrade().map(|inner| ExtensionHost { inner })
    }
}

impl ExtensionHost {
    /// Creates a host that loads extension modules through `loader`.
    ///
    /// The contribution processor is installed as the first registration
    /// listener; contribution points still have to be registered.
    pub fn new(config: HostConfig, loader: Rc<dyn ModuleLoader>) -> Self {
        let host = Self {
            inner: Rc::new(HostInner {
                config,
                loader,
                store: RefCell::new(Store::new()),
                pending: RefCell::new(HashMap::new()),
                polling: RefCell::new(HashSet::new()),
                listeners: RefCell::new(ListenerSet::default()),
            }),
        };
        let weak = host.downgrade();
        host.add_listener(
            LifecycleEvent::Registered,
            Rc::new(move |extension: &Extension| -> Result<(), ListenerError> {
                if let Some(host) = weak.upgrade() {
                    processor::process_extension(&host, &extension.id);
                }
                Ok(())
            }),
        );
        host
    }

    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    pub fn downgrade(&self) -> WeakHost {
        WeakHost(Rc::downgrade(&self.inner))
    }

    pub fn get_extension(&self, id: &str) -> Option<Extension> {
        self.inner.store.borrow().extensions.get(&id.to_string())
    }

    /// Snapshot of every record; identity changes only when a record does.
    pub fn extensions(&self) -> Rc<BTreeMap<String, Extension>> {
        self.inner.store.borrow().extensions.all()
    }

    pub fn extension_context(&self, id: &str) -> Option<ExtensionContextData> {
        self.inner.store.borrow().contexts.get(&id.to_string())
    }

    /// Handle onto `id`'s context, as extension code receives it.
    pub fn context_handle(&self, id: &str) -> Option<ExtensionContext> {
        let record = self.get_extension(id)?;
        Some(ExtensionContext::new(
            self.downgrade(),
            id,
            Rc::clone(&record.manifest),
        ))
    }

    /// Store section versions, in `extensions, contexts, points, code,
    /// framework` order.
    pub fn store_versions(&self) -> [u64; 5] {
        let store = self.inner.store.borrow();
        [
            store.extensions.version(),
            store.contexts.version(),
            store.points.version(),
            store.code.version(),
            store.framework.version(),
        ]
    }

    pub fn on_extension_registered(
        &self,
        listener: impl Fn(&Extension) -> Result<(), ListenerError> + 'static,
    ) -> Disposable {
        self.add_listener(LifecycleEvent::Registered, Rc::new(listener))
    }

    pub fn on_extension_will_unregister(
        &self,
        listener: impl Fn(&Extension) -> Result<(), ListenerError> + 'static,
    ) -> Disposable {
        self.add_listener(LifecycleEvent::WillUnregister, Rc::new(listener))
    }

    pub fn on_extension_unregistered(
        &self,
        listener: impl Fn(&Extension) -> Result<(), ListenerError> + 'static,
    ) -> Disposable {
        self.add_listener(LifecycleEvent::Unregistered, Rc::new(listener))
    }

    fn add_listener(&self, event: LifecycleEvent, listener: ExtensionListener) -> Disposable {
        let id = self.inner.listeners.borrow_mut().add(event, listener);
        let host = self.downgrade();
        Disposable::new(move || {
            if let Some(host) = host.upgrade() {
                host.inner.listeners.borrow_mut().remove(id);
            }
        })
    }

    pub(crate) fn notify(&self, event: LifecycleEvent, extension: &Extension) {
        let listeners = self.inner.listeners.borrow().snapshot(event);
        notify_all(listeners, event, extension);
    }

    /// Read-modify-write of a stored record.
    pub(crate) fn update_extension(
        &self,
        id: &str,
        change: impl FnOnce(&mut Extension),
    ) -> Option<Extension> {
        self.inner
            .store
            .borrow_mut()
            .extensions
            .update(&id.to_string(), change)
    }

    /// Read-modify-write of a stored context.
    pub(crate) fn update_context(
        &self,
        id: &str,
        change: impl FnOnce(&mut ExtensionContextData),
    ) -> Option<ExtensionContextData> {
        self.inner
            .store
            .borrow_mut()
            .contexts
            .update(&id.to_string(), change)
    }

    /// Rejects `id` outside of an activation (e.g. contribution failures).
    ///
    /// A running or in-flight extension keeps its status and is rejected by
    /// its next deactivation, so its `deactivate` hook still runs.
    pub(crate) fn reject_extension(
        &self,
        id: &str,
        reasons: Vec<ExtensionError>,
    ) -> Option<Extension> {
        let running = self.pending_activation(id).is_some()
            || self.get_extension(id).is_some_and(|record| {
                !matches!(
                    record.status,
                    ExtensionStatus::Inactive | ExtensionStatus::Rejected
                )
            });
        let status = if running { "deferred" } else { "error" };
        for reason in &reasons {
            warn!(
                "event=extension_reject module=host status={} extension_id={} kind={} reason={}",
                status,
                id,
                reason.kind(),
                reason
            );
        }
        self.update_extension(id, move |record| {
            if running {
                record.defer_rejection(reasons);
            } else {
                record.reject(reasons);
            }
        })
    }

    /// Adds to `id`'s subscriptions, or disposes right away when `id` has no context.
    pub(crate) fn push_subscription(&self, id: &str, disposable: Disposable) {
        let mut pending = Some(disposable);
        self.update_context(id, |context| {
            if let Some(disposable) = pending.take() {
                context.subscriptions.push(disposable);
            }
        });
        if let Some(orphan) = pending {
            orphan.dispose();
        }
    }

    /// Disposes and forgets every subscription of `id`.
    pub(crate) fn release_subscriptions(&self, id: &str) -> usize {
        let mut released = Vec::new();
        self.update_context(id, |context| {
            released = std::mem::take(&mut context.subscriptions);
        });
        let count = released.len();
        for subscription in released {
            subscription.dispose();
        }
        count
    }

    /// Resolves a manifest-relative path for `id`: the context's resolver,
    /// then `extensions_root/<id>/`, then the path as given.
    pub fn resolve_extension_path(&self, id: &str, relative: &str) -> PathBuf {
        let resolver = self
            .extension_context(id)
            .and_then(|context| context.path_resolver);
        if let Some(resolver) = resolver {
            return resolver(relative);
        }
        match self.inner.config.extensions_root.as_deref() {
            Some(root) => root.join(id).join(relative),
            None => Path::new(relative).to_path_buf(),
        }
    }
}

impl Default for ExtensionHost {
    fn default() -> Self {
        Self::new(HostConfig::default(), Rc::new(StaticModuleLoader::new()))
    }
}
