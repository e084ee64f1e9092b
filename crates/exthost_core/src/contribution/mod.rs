//! Contribution points and the contributions extensions make to them.
//!
//! # Responsibility
//! - Describe host-defined extensibility slots (`point`).
//! - Validate, transform and index manifest contributions (`processor`).
//! - Register and lazily resolve executable contributions (`code`).
//!
//! # Invariants
//! - Processing one point never rolls back another point's result.
//! - Code lookups for unknown points fail with `UnregisteredPoint`.

pub mod builtin;
pub mod code;
pub mod keybinding;
pub mod kinds;
pub mod point;
pub mod processor;
pub mod schema;

use crate::when::WhenParseError;
use keybinding::KeybindingError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use code::CodeValue;
pub use kinds::{
    CommandContribution, Contribution, KeybindingContribution, MenuItemContribution,
    ViewContribution,
};
pub use point::{CodeInfo, ContributionPoint, ManifestInfo, ProcessEntry};

/// Code contribution lookup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContributionError {
    UnregisteredPoint(String),
    UnregisteredCode {
        point: String,
        id: String,
    },
    TypeMismatch {
        point: String,
        id: String,
        expected: &'static str,
    },
}

impl Display for ContributionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnregisteredPoint(point) => {
                write!(f, "Unregistered contribution point '{point}'")
            }
            Self::UnregisteredCode { point, id } => {
                write!(f, "Unregistered code contribution '{point}/{id}'")
            }
            Self::TypeMismatch { point, id, expected } => write!(
                f,
                "code contribution '{point}/{id}' is not a {expected}"
            ),
        }
    }
}

impl Error for ContributionError {}

/// Failure raised by a point's `process_entry` transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributionProcessError {
    message: String,
}

impl ContributionProcessError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ContributionProcessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ContributionProcessError {}

impl From<serde_json::Error> for ContributionProcessError {
    fn from(value: serde_json::Error) -> Self {
        Self::new(value.to_string())
    }
}

impl From<WhenParseError> for ContributionProcessError {
    fn from(value: WhenParseError) -> Self {
        Self::new(format!("invalid when clause: {value}"))
    }
}

impl From<KeybindingError> for ContributionProcessError {
    fn from(value: KeybindingError) -> Self {
        Self::new(value.to_string())
    }
}
