//! Extension manifest declaration and validation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static ID_SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$").expect("valid id segment regex"));

/// Declarative extension manifest, as authored in JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionManifest {
    /// Publisher segment of the extension id.
    #[serde(default)]
    pub provider: String,
    /// Name segment of the extension id.
    #[serde(default)]
    pub name: String,
    /// Module path, resolved through the extension's path resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub activation_events: Vec<String>,
    /// Extension ids (`provider.name`) activated before this one, in order.
    #[serde(default)]
    pub extension_dependencies: Vec<String>,
    /// Raw contribution payloads keyed by contribution point id.
    #[serde(default)]
    pub contributes: BTreeMap<String, JsonValue>,
}

impl ExtensionManifest {
    /// Shorthand for a manifest with only the identity fields set.
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parses and validates a manifest from JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self, ManifestValidationError> {
        let value: JsonValue = serde_json::from_str(raw)
            .map_err(|err| ManifestValidationError::Malformed(err.to_string()))?;
        Self::from_json_value(value)
    }

    /// Parses and validates a manifest from a JSON value.
    pub fn from_json_value(value: JsonValue) -> Result<Self, ManifestValidationError> {
        let manifest: Self = serde_json::from_value(value)
            .map_err(|err| ManifestValidationError::Malformed(err.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Stable extension id: `provider.name`.
    pub fn id(&self) -> String {
        format!("{}.{}", self.provider.trim(), self.name.trim())
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Validates declaration-level manifest invariants.
    pub fn validate(&self) -> Result<(), ManifestValidationError> {
        let provider = self.provider.trim();
        if provider.is_empty() {
            return Err(ManifestValidationError::MissingProvider);
        }
        if !ID_SEGMENT_RE.is_match(provider) {
            return Err(ManifestValidationError::InvalidProvider(
                self.provider.clone(),
            ));
        }

        let name = self.name.trim();
        if name.is_empty() {
            return Err(ManifestValidationError::MissingName);
        }
        if !ID_SEGMENT_RE.is_match(name) {
            return Err(ManifestValidationError::InvalidName(self.name.clone()));
        }

        if self
            .extension_dependencies
            .iter()
            .any(|dependency| dependency.trim().is_empty())
        {
            return Err(ManifestValidationError::EmptyDependency);
        }
        if self
            .activation_events
            .iter()
            .any(|event| event.trim().is_empty())
        {
            return Err(ManifestValidationError::EmptyActivationEvent);
        }
        Ok(())
    }
}

/// Manifest validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestValidationError {
    Malformed(String),
    MissingProvider,
    InvalidProvider(String),
    MissingName,
    InvalidName(String),
    EmptyDependency,
    EmptyActivationEvent,
}

impl Display for ManifestValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(reason) => write!(f, "manifest is not valid JSON: {reason}"),
            Self::MissingProvider => write!(f, "manifest provider must not be empty"),
            Self::InvalidProvider(value) => write!(f, "manifest provider is invalid: {value}"),
            Self::MissingName => write!(f, "manifest name must not be empty"),
            Self::InvalidName(value) => write!(f, "manifest name is invalid: {value}"),
            Self::EmptyDependency => {
                write!(f, "manifest contains empty extension dependency")
            }
            Self::EmptyActivationEvent => {
                write!(f, "manifest contains empty activation event")
            }
        }
    }
}

impl Error for ManifestValidationError {}

#[cfg(test)]
mod tests {
    use super::{ExtensionManifest, ManifestValidationError};
    use serde_json::json;

    #[test]
    fn parses_camel_case_fields() {
        let manifest = ExtensionManifest::from_json_value(json!({
            "provider": "acme",
            "name": "tools",
            "displayName": "Acme Tools",
            "main": "out/main.js",
            "activationEvents": ["onStartup"],
            "extensionDependencies": ["acme.base"],
            "contributes": { "commands": [] }
        }))
        .expect("manifest should parse");

        assert_eq!(manifest.id(), "acme.tools");
        assert_eq!(manifest.label(), "Acme Tools");
        assert_eq!(manifest.main.as_deref(), Some("out/main.js"));
        assert_eq!(manifest.extension_dependencies, vec!["acme.base"]);
        assert!(manifest.contributes.contains_key("commands"));
    }

    #[test]
    fn rejects_missing_identity_fields() {
        let err = ExtensionManifest::from_json_value(json!({ "name": "x" }))
            .expect_err("provider is required");
        assert_eq!(err, ManifestValidationError::MissingProvider);

        let err = ExtensionManifest::from_json_value(json!({ "provider": "acme", "name": "  " }))
            .expect_err("blank name is rejected");
        assert_eq!(err, ManifestValidationError::MissingName);
    }

    #[test]
    fn rejects_invalid_id_segments() {
        let err = ExtensionManifest::new("acme corp", "x")
            .validate()
            .expect_err("spaces are not allowed");
        assert!(matches!(err, ManifestValidationError::InvalidProvider(_)));

        let err = ExtensionManifest::new("acme", "x.y")
            .validate()
            .expect_err("dots would make the id ambiguous");
        assert!(matches!(err, ManifestValidationError::InvalidName(_)));
    }

    #[test]
    fn rejects_wrongly_typed_fields() {
        let err = ExtensionManifest::from_json_str(r#"{"provider":"acme","name":"x","main":3}"#)
            .expect_err("main must be a string");
        assert!(matches!(err, ManifestValidationError::Malformed(_)));
    }

    #[test]
    fn rejects_blank_dependency() {
        let mut manifest = ExtensionManifest::new("acme", "x");
        manifest.extension_dependencies.push(" ".to_string());
        assert_eq!(
            manifest.validate(),
            Err(ManifestValidationError::EmptyDependency)
        );
    }
}
