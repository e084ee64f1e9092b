//! Runtime shapes of processed contributions.

use crate::when::{ContextMap, WhenClause};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Processed contribution, tagged by the kind of point that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Contribution {
    Commands(Vec<CommandContribution>),
    Keybindings(Vec<KeybindingContribution>),
    /// Menu id → items.
    Menus(BTreeMap<String, Vec<MenuItemContribution>>),
    /// View container id → views.
    Views(BTreeMap<String, Vec<ViewContribution>>),
    /// Payload of a point without a transform.
    Raw(JsonValue),
}

impl Contribution {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Commands(_) => "commands",
            Self::Keybindings(_) => "keybindings",
            Self::Menus(_) => "menus",
            Self::Views(_) => "views",
            Self::Raw(_) => "raw",
        }
    }

    /// Number of leaf entries.
    pub fn entry_count(&self) -> usize {
        match self {
            Self::Commands(items) => items.len(),
            Self::Keybindings(items) => items.len(),
            Self::Menus(menus) => menus.values().map(Vec::len).sum(),
            Self::Views(containers) => containers.values().map(Vec::len).sum(),
            Self::Raw(JsonValue::Array(items)) => items.len(),
            Self::Raw(JsonValue::Object(map)) => map.len(),
            Self::Raw(_) => 1,
        }
    }

    pub fn as_commands(&self) -> Option<&[CommandContribution]> {
        match self {
            Self::Commands(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_keybindings(&self) -> Option<&[KeybindingContribution]> {
        match self {
            Self::Keybindings(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_menus(&self) -> Option<&BTreeMap<String, Vec<MenuItemContribution>>> {
        match self {
            Self::Menus(menus) => Some(menus),
            _ => None,
        }
    }

    pub fn as_views(&self) -> Option<&BTreeMap<String, Vec<ViewContribution>>> {
        match self {
            Self::Views(containers) => Some(containers),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&JsonValue> {
        match self {
            Self::Raw(value) => Some(value),
            _ => None,
        }
    }
}

/// Evaluates an optional clause; a missing clause always holds.
pub fn clause_holds(clause: Option<&Arc<WhenClause>>, context: &ContextMap) -> bool {
    clause.map_or(true, |clause| clause.evaluate(context))
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandContribution {
    pub command: String,
    pub title: String,
    pub category: Option<String>,
    pub icon: Option<String>,
    /// Gates invocation, not visibility.
    pub enablement: Option<Arc<WhenClause>>,
}

impl CommandContribution {
    pub fn new(command: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            title: title.into(),
            category: None,
            icon: None,
            enablement: None,
        }
    }

    pub fn is_enabled(&self, context: &ContextMap) -> bool {
        clause_holds(self.enablement.as_ref(), context)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeybindingContribution {
    pub command: String,
    /// Normalized key, see `keybinding::normalize_key`.
    pub key: String,
    pub mac: Option<String>,
    pub when: Option<Arc<WhenClause>>,
    pub args: Option<JsonValue>,
}

impl KeybindingContribution {
    pub fn is_active(&self, context: &ContextMap) -> bool {
        clause_holds(self.when.as_ref(), context)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuItemContribution {
    pub command: String,
    pub group: Option<String>,
    pub when: Option<Arc<WhenClause>>,
}

impl MenuItemContribution {
    pub fn is_visible(&self, context: &ContextMap) -> bool {
        clause_holds(self.when.as_ref(), context)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewContribution {
    pub id: String,
    pub name: String,
    pub when: Option<Arc<WhenClause>>,
}

impl ViewContribution {
    pub fn is_visible(&self, context: &ContextMap) -> bool {
        clause_holds(self.when.as_ref(), context)
    }
}
