//! Per-extension runtime context.
//!
//! # Responsibility
//! - Hold what the host knows about one extension beyond its record:
//!   activation events, processed contributions, the loaded module and
//!   the subscriptions released on deactivation.
//! - Give extension code a handle (`ExtensionContext`) back into the host.
//!
//! # Invariants
//! - The module is loaded at most once per registration.
//! - Subscriptions are released exactly once, on deactivation or unregistration.

use super::manifest::ExtensionManifest;
use crate::activation::module::ExtensionModule;
use crate::contribution::code::CodeValue;
use crate::contribution::kinds::Contribution;
use crate::disposable::Disposable;
use crate::host::{ExtensionHost, WeakHost};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Maps a manifest-relative path to a loadable module path.
pub type PathResolver = Rc<dyn Fn(&str) -> PathBuf>;

/// Options accepted by `ExtensionHost::register_extension`.
#[derive(Clone, Default)]
pub struct RegisterOptions {
    /// Directory manifest paths are relative to.
    pub base_dir: Option<PathBuf>,
    /// Overrides `base_dir` when set.
    pub path_resolver: Option<PathResolver>,
    /// Pre-loaded module; skips the module loader entirely.
    pub module: Option<Rc<dyn ExtensionModule>>,
}

impl RegisterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn with_path_resolver(mut self, resolver: impl Fn(&str) -> PathBuf + 'static) -> Self {
        self.path_resolver = Some(Rc::new(resolver));
        self
    }

    pub fn with_module(mut self, module: Rc<dyn ExtensionModule>) -> Self {
        self.module = Some(module);
        self
    }

    pub(crate) fn into_parts(self) -> (Option<PathResolver>, Option<Rc<dyn ExtensionModule>>) {
        let resolver = match (self.path_resolver, self.base_dir) {
            (Some(resolver), _) => Some(resolver),
            (None, Some(base_dir)) => {
                let resolver: PathResolver = Rc::new(move |relative: &str| base_dir.join(relative));
                Some(resolver)
            }
            (None, None) => None,
        };
        (resolver, self.module)
    }
}

/// Stored state of one extension's context.
#[derive(Clone, Default)]
pub struct ExtensionContextData {
    pub activation_events: BTreeSet<String>,
    pub contributions: BTreeMap<String, Contribution>,
    pub module: Option<Rc<dyn ExtensionModule>>,
    pub module_path: Option<PathBuf>,
    pub path_resolver: Option<PathResolver>,
    pub subscriptions: Vec<Disposable>,
}

impl ExtensionContextData {
    pub(crate) fn new(
        manifest: &ExtensionManifest,
        path_resolver: Option<PathResolver>,
        module: Option<Rc<dyn ExtensionModule>>,
    ) -> Self {
        Self {
            activation_events: manifest
                .activation_events
                .iter()
                .map(|event| event.trim().to_string())
                .collect(),
            path_resolver,
            module,
            ..Self::default()
        }
    }

    /// True when `event` (or the `*` wildcard) activates this extension.
    pub fn listens_to(&self, event: &str) -> bool {
        self.activation_events.contains(event) || self.activation_events.contains("*")
    }
}

/// Handle given to extension code during `activate` and `deactivate`.
#[derive(Clone)]
pub struct ExtensionContext {
    host: WeakHost,
    extension_id: String,
    manifest: Rc<ExtensionManifest>,
}

impl ExtensionContext {
    pub(crate) fn new(host: WeakHost, extension_id: &str, manifest: Rc<ExtensionManifest>) -> Self {
        Self {
            host,
            extension_id: extension_id.to_string(),
            manifest,
        }
    }

    pub fn extension_id(&self) -> &str {
        &self.extension_id
    }

    pub fn manifest(&self) -> &ExtensionManifest {
        &self.manifest
    }

    /// The owning host, unless it has been dropped.
    pub fn host(&self) -> Option<ExtensionHost> {
        self.host.upgrade()
    }

    /// Resolves a manifest-relative path the way module loading does.
    pub fn resolve_path(&self, relative: &str) -> PathBuf {
        match self.host.upgrade() {
            Some(host) => host.resolve_extension_path(&self.extension_id, relative),
            None => Path::new(relative).to_path_buf(),
        }
    }

    /// Ties `disposable` to this extension; it is released on deactivation.
    pub fn subscribe(&self, disposable: Disposable) {
        match self.host.upgrade() {
            Some(host) => host.push_subscription(&self.extension_id, disposable),
            None => disposable.dispose(),
        }
    }

    /// Registers a code contribution owned by this extension.
    pub fn register_code_contribution(
        &self,
        point: &str,
        id: &str,
        value: CodeValue,
    ) -> Disposable {
        let Some(host) = self.host.upgrade() else {
            return Disposable::noop();
        };
        let disposable = host.register_code_contribution(point, id, value);
        self.subscribe(disposable.clone());
        disposable
    }

    pub fn activation_events(&self) -> BTreeSet<String> {
        self.data()
            .map(|data| data.activation_events)
            .unwrap_or_default()
    }

    /// Processed contribution for `point`, if this extension declared one.
    pub fn contribution(&self, point: &str) -> Option<Contribution> {
        self.data()?.contributions.get(point).cloned()
    }

    fn data(&self) -> Option<ExtensionContextData> {
        self.host.upgrade()?.extension_context(&self.extension_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{ExtensionContextData, RegisterOptions};
    use crate::extension::manifest::ExtensionManifest;
    use std::path::PathBuf;

    #[test]
    fn base_dir_becomes_a_join_resolver() {
        let (resolver, module) = RegisterOptions::new()
            .with_base_dir("/opt/ext/acme.x")
            .into_parts();
        let resolver = resolver.expect("base dir yields a resolver");
        assert_eq!(
            resolver("out/main.js"),
            PathBuf::from("/opt/ext/acme.x/out/main.js")
        );
        assert!(module.is_none());
    }

    #[test]
    fn explicit_resolver_wins_over_base_dir() {
        let (resolver, _) = RegisterOptions::new()
            .with_base_dir("/ignored")
            .with_path_resolver(|relative| PathBuf::from("/custom").join(relative))
            .into_parts();
        let resolver = resolver.expect("resolver is kept");
        assert_eq!(resolver("m"), PathBuf::from("/custom/m"));
    }

    #[test]
    fn wildcard_event_matches_everything() {
        let mut manifest = ExtensionManifest::new("acme", "x");
        manifest.activation_events = vec!["*".to_string()];
        let data = ExtensionContextData::new(&manifest, None, None);
        assert!(data.listens_to("onCommand:anything"));

        let quiet = ExtensionContextData::new(&ExtensionManifest::new("acme", "y"), None, None);
        assert!(!quiet.listens_to("onCommand:anything"));
    }
}
