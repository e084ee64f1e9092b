//! Lifecycle failures recorded on an extension's `reasons`.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// One recorded lifecycle failure.
///
/// These are never returned from the activation API; they accumulate on the
/// extension record alongside `status = rejected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    /// Contribution payload could not be interpreted (e.g. missing id field).
    InvalidContribution {
        point: String,
        extension: String,
        message: String,
    },
    /// Contribution payload failed the point's schema.
    ContributionValidation {
        point: String,
        extension: String,
        path: String,
        message: String,
    },
    /// The point's transform rejected the payload.
    ContributionProcessing {
        point: String,
        extension: String,
        message: String,
    },
    /// Wrapper: one or more dependencies did not reach `active`.
    DependencyFailed {
        extension: String,
        dependencies: Vec<String>,
    },
    DependencyMissing {
        extension: String,
        dependency: String,
    },
    DependencyCycle {
        extension: String,
        cycle: Vec<String>,
    },
    ModuleLoad {
        extension: String,
        path: String,
        message: String,
    },
    Activation {
        extension: String,
        message: String,
    },
    Deactivation {
        extension: String,
        message: String,
    },
}

impl ExtensionError {
    pub fn extension_id(&self) -> &str {
        match self {
            Self::InvalidContribution { extension, .. }
            | Self::ContributionValidation { extension, .. }
            | Self::ContributionProcessing { extension, .. }
            | Self::DependencyFailed { extension, .. }
            | Self::DependencyMissing { extension, .. }
            | Self::DependencyCycle { extension, .. }
            | Self::ModuleLoad { extension, .. }
            | Self::Activation { extension, .. }
            | Self::Deactivation { extension, .. } => extension,
        }
    }

    /// Short machine-readable label, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidContribution { .. } => "invalid_contribution",
            Self::ContributionValidation { .. } => "contribution_validation",
            Self::ContributionProcessing { .. } => "contribution_processing",
            Self::DependencyFailed { .. } => "dependency_failed",
            Self::DependencyMissing { .. } => "dependency_missing",
            Self::DependencyCycle { .. } => "dependency_cycle",
            Self::ModuleLoad { .. } => "module_load",
            Self::Activation { .. } => "activation",
            Self::Deactivation { .. } => "deactivation",
        }
    }
}

impl Display for ExtensionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidContribution {
                point,
                extension,
                message,
            } => write!(
                f,
                "invalid contribution to '{point}' from '{extension}': {message}"
            ),
            Self::ContributionValidation {
                point,
                extension,
                path,
                message,
            } => write!(
                f,
                "contribution to '{point}' from '{extension}' failed validation at {path}: {message}"
            ),
            Self::ContributionProcessing {
                point,
                extension,
                message,
            } => write!(
                f,
                "failed to process contribution to '{point}' from '{extension}': {message}"
            ),
            Self::DependencyFailed {
                extension,
                dependencies,
            } => write!(
                f,
                "cannot activate '{extension}': dependencies failed to activate: {}",
                dependencies.join(", ")
            ),
            Self::DependencyMissing {
                extension,
                dependency,
            } => write!(
                f,
                "dependency '{dependency}' of '{extension}' is not registered"
            ),
            Self::DependencyCycle { extension, cycle } => write!(
                f,
                "cannot activate '{extension}': dependency cycle {}",
                cycle.join(" -> ")
            ),
            Self::ModuleLoad {
                extension,
                path,
                message,
            } => write!(
                f,
                "failed to load module '{path}' for '{extension}': {message}"
            ),
            Self::Activation { extension, message } => {
                write!(f, "activation of '{extension}' failed: {message}")
            }
            Self::Deactivation { extension, message } => {
                write!(f, "deactivation of '{extension}' failed: {message}")
            }
        }
    }
}

impl Error for ExtensionError {}

#[cfg(test)]
mod tests {
    use super::ExtensionError;

    #[test]
    fn cycle_message_lists_the_path() {
        let err = ExtensionError::DependencyCycle {
            extension: "a.a".to_string(),
            cycle: vec!["a.a".to_string(), "b.b".to_string(), "a.a".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "cannot activate 'a.a': dependency cycle a.a -> b.b -> a.a"
        );
        assert_eq!(err.kind(), "dependency_cycle");
        assert_eq!(err.extension_id(), "a.a");
    }
}
