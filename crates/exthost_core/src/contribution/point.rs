//! Contribution point definitions.

use super::kinds::Contribution;
use super::ContributionProcessError;
use serde_json::Value as JsonValue;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Placeholder substituted with a contribution id in activation event templates.
pub const ID_PLACEHOLDER: &str = "${id}";

const DEFAULT_ID_KEY: &str = "id";

/// Transforms one validated manifest payload into its runtime shape.
pub type ProcessEntry = Rc<dyn Fn(&JsonValue) -> Result<Contribution, ContributionProcessError>>;

/// How a point reads manifest data.
#[derive(Clone)]
pub struct ManifestInfo {
    pub schema: JsonValue,
    pub process_entry: Option<ProcessEntry>,
}

/// How a point maps contribution ids to activation events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeInfo {
    /// Field holding the contribution id; `"id"` when unset.
    pub id_key: Option<String>,
    /// Event template, e.g. `onCommand:${id}`.
    pub activation_event: Option<String>,
}

impl CodeInfo {
    pub fn id_key(&self) -> &str {
        self.id_key.as_deref().unwrap_or(DEFAULT_ID_KEY)
    }

    pub fn has_placeholder(&self) -> bool {
        self.activation_event
            .as_deref()
            .is_some_and(|template| template.contains(ID_PLACEHOLDER))
    }

    /// Activation event announcing contribution `id`, if the point has a template.
    pub fn activation_event_for(&self, id: &str) -> Option<String> {
        self.activation_event
            .as_deref()
            .map(|template| template.replace(ID_PLACEHOLDER, id))
    }
}

/// A host-defined extensibility slot.
#[derive(Clone)]
pub struct ContributionPoint {
    pub id: String,
    pub manifest_info: Option<ManifestInfo>,
    pub code_info: Option<CodeInfo>,
}

impl ContributionPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            manifest_info: None,
            code_info: None,
        }
    }

    /// Accepts manifest data validated against `schema`, stored raw.
    pub fn with_schema(mut self, schema: JsonValue) -> Self {
        self.manifest_info = Some(ManifestInfo {
            schema,
            process_entry: None,
        });
        self
    }

    /// Accepts manifest data validated against `schema` and transformed by `process`.
    pub fn with_processor(
        mut self,
        schema: JsonValue,
        process: impl Fn(&JsonValue) -> Result<Contribution, ContributionProcessError> + 'static,
    ) -> Self {
        self.manifest_info = Some(ManifestInfo {
            schema,
            process_entry: Some(Rc::new(process)),
        });
        self
    }

    pub fn with_code_info(
        mut self,
        id_key: Option<&str>,
        activation_event: Option<&str>,
    ) -> Self {
        self.code_info = Some(CodeInfo {
            id_key: id_key.map(str::to_string),
            activation_event: activation_event.map(str::to_string),
        });
        self
    }
}

impl Debug for ContributionPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContributionPoint")
            .field("id", &self.id)
            .field(
                "schema",
                &self.manifest_info.as_ref().map(|info| &info.schema),
            )
            .field(
                "process_entry",
                &self
                    .manifest_info
                    .as_ref()
                    .is_some_and(|info| info.process_entry.is_some()),
            )
            .field("code_info", &self.code_info)
            .finish()
    }
}
