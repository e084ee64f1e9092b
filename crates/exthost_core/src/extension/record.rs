//! Extension lifecycle record.

use super::error::ExtensionError;
use super::manifest::ExtensionManifest;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Opaque value an extension's `activate` hands to its dependents.
pub type Exports = Rc<dyn Any>;

/// Lifecycle status.
///
/// `inactive → loading → activating → active`, `active → deactivating →
/// inactive`, and any state may move to `rejected`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionStatus {
    #[default]
    Inactive,
    Loading,
    Activating,
    Active,
    Deactivating,
    Rejected,
}

impl ExtensionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Loading => "loading",
            Self::Activating => "activating",
            Self::Active => "active",
            Self::Deactivating => "deactivating",
            Self::Rejected => "rejected",
        }
    }
}

impl Display for ExtensionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one registered extension.
///
/// Records are values: the store replaces them on every transition.
#[derive(Clone)]
pub struct Extension {
    pub id: String,
    pub manifest: Rc<ExtensionManifest>,
    pub status: ExtensionStatus,
    pub exports: Option<Exports>,
    /// Failure history, newest first.
    pub reasons: Vec<ExtensionError>,
    /// Set when a failure arrived while the extension was running; the next
    /// deactivation ends in `rejected` instead of `inactive`.
    pub rejection_pending: bool,
}

impl Extension {
    pub(crate) fn new(manifest: Rc<ExtensionManifest>) -> Self {
        Self {
            id: manifest.id(),
            manifest,
            status: ExtensionStatus::Inactive,
            exports: None,
            reasons: Vec::new(),
            rejection_pending: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ExtensionStatus::Active
    }

    pub fn is_rejected(&self) -> bool {
        self.status == ExtensionStatus::Rejected
    }

    /// Typed view of the exports, when they are a `T`.
    pub fn exports_as<T: 'static>(&self) -> Option<Rc<T>> {
        self.exports.clone()?.downcast::<T>().ok()
    }

    /// Moves to `rejected`, prepending `reasons` to the history.
    pub(crate) fn reject(&mut self, reasons: Vec<ExtensionError>) {
        self.status = ExtensionStatus::Rejected;
        self.exports = None;
        self.rejection_pending = false;
        self.prepend_reasons(reasons);
    }

    /// Records `reasons` but keeps the current status until the extension
    /// is deactivated.
    pub(crate) fn defer_rejection(&mut self, reasons: Vec<ExtensionError>) {
        self.rejection_pending = true;
        self.prepend_reasons(reasons);
    }

    fn prepend_reasons(&mut self, reasons: Vec<ExtensionError>) {
        let previous = std::mem::take(&mut self.reasons);
        self.reasons = reasons;
        self.reasons.extend(previous);
    }
}

impl Debug for Extension {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("has_exports", &self.exports.is_some())
            .field("reasons", &self.reasons)
            .field("rejection_pending", &self.rejection_pending)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Extension, ExtensionStatus};
    use crate::extension::error::ExtensionError;
    use crate::extension::manifest::ExtensionManifest;
    use std::rc::Rc;

    #[test]
    fn reject_prepends_new_reasons() {
        let mut record = Extension::new(Rc::new(ExtensionManifest::new("acme", "x")));
        record.reject(vec![ExtensionError::Activation {
            extension: "acme.x".to_string(),
            message: "first".to_string(),
        }]);
        record.reject(vec![ExtensionError::Activation {
            extension: "acme.x".to_string(),
            message: "second".to_string(),
        }]);

        assert_eq!(record.status, ExtensionStatus::Rejected);
        let messages: Vec<String> = record.reasons.iter().map(ToString::to_string).collect();
        assert!(messages[0].contains("second"));
        assert!(messages[1].contains("first"));
    }

    #[test]
    fn deferred_rejection_keeps_status_until_rejected() {
        let mut record = Extension::new(Rc::new(ExtensionManifest::new("acme", "x")));
        record.status = ExtensionStatus::Active;
        record.defer_rejection(vec![ExtensionError::Activation {
            extension: "acme.x".to_string(),
            message: "late".to_string(),
        }]);
        assert_eq!(record.status, ExtensionStatus::Active);
        assert!(record.rejection_pending);
        assert_eq!(record.reasons.len(), 1);

        record.reject(Vec::new());
        assert_eq!(record.status, ExtensionStatus::Rejected);
        assert!(!record.rejection_pending);
        assert_eq!(record.reasons.len(), 1);
    }

    #[test]
    fn exports_downcast_to_concrete_type() {
        let mut record = Extension::new(Rc::new(ExtensionManifest::new("acme", "x")));
        record.exports = Some(Rc::new(42_u32));
        assert_eq!(record.exports_as::<u32>().as_deref(), Some(&42));
        assert!(record.exports_as::<String>().is_none());
    }

    #[test]
    fn status_serializes_lowercase() {
        let raw = serde_json::to_string(&ExtensionStatus::Deactivating).expect("serialize");
        assert_eq!(raw, "\"deactivating\"");
    }
}
