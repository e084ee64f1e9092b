//! Versioned state container shared by every host component.
//!
//! # Responsibility
//! - Hold extensions, their contexts, contribution points, code
//!   contributions and the framework context.
//! - Hand out snapshots whose identity tracks content changes.
//!
//! # Invariants
//! - Every mutation bumps the section version and completes synchronously.
//! - `Section::all` returns the same `Rc` until the section is mutated, so
//!   `Rc::ptr_eq` on two snapshots is a valid "unchanged" test.

use crate::contribution::code::CodeValue;
use crate::contribution::point::ContributionPoint;
use crate::extension::context::ExtensionContextData;
use crate::extension::record::Extension;
use crate::when::Value;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Key of one code contribution: `(point id, contribution id)`.
pub type CodeKey = (String, String);

/// One keyed, copy-on-write section of the store.
pub struct Section<K: Ord + Clone, V: Clone> {
    data: Rc<BTreeMap<K, V>>,
    version: u64,
}

impl<K: Ord + Clone, V: Clone> Section<K, V> {
    pub fn get(&self, key: &K) -> Option<V> {
        self.data.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    pub fn set(&mut self, key: K, value: V) {
        Rc::make_mut(&mut self.data).insert(key, value);
        self.version += 1;
    }

    pub fn delete(&mut self, key: &K) -> Option<V> {
        if !self.data.contains_key(key) {
            return None;
        }
        let removed = Rc::make_mut(&mut self.data).remove(key);
        self.version += 1;
        removed
    }

    /// Read-modify-write of one entry. Returns the new value, or `None` when absent.
    pub fn update(&mut self, key: &K, apply: impl FnOnce(&mut V)) -> Option<V> {
        let mut value = self.data.get(key)?.clone();
        apply(&mut value);
        self.set(key.clone(), value.clone());
        Some(value)
    }

    pub fn replace_all(&mut self, data: BTreeMap<K, V>) {
        self.data = Rc::new(data);
        self.version += 1;
    }

    pub fn all(&self) -> Rc<BTreeMap<K, V>> {
        Rc::clone(&self.data)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K: Ord + Clone, V: Clone> Default for Section<K, V> {
    fn default() -> Self {
        Self {
            data: Rc::new(BTreeMap::new()),
            version: 0,
        }
    }
}

/// Host-wide state. Owned by one `ExtensionHost`.
#[derive(Default)]
pub struct Store {
    pub extensions: Section<String, Extension>,
    pub contexts: Section<String, ExtensionContextData>,
    pub points: Section<String, Rc<ContributionPoint>>,
    pub code: Section<CodeKey, CodeValue>,
    pub framework: Section<String, Value>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }
}
