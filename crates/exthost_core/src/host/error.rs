use crate::extension::manifest::ManifestValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type HostResult<T> = Result<T, HostError>;

/// Programmer errors returned synchronously by host operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    ExtensionNotFound(String),
    DuplicateExtension(String),
    InvalidManifest(ManifestValidationError),
    ContributionPointNotFound(String),
    InvalidContributionPoint(String),
    DuplicateContributionPoint(String),
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExtensionNotFound(id) => write!(f, "extension not registered: {id}"),
            Self::DuplicateExtension(id) => write!(f, "extension id already registered: {id}"),
            Self::InvalidManifest(err) => write!(f, "invalid extension manifest: {err}"),
            Self::ContributionPointNotFound(id) => {
                write!(f, "Unregistered contribution point '{id}'")
            }
            Self::InvalidContributionPoint(id) => {
                write!(f, "contribution point id is invalid: {id:?}")
            }
            Self::DuplicateContributionPoint(id) => {
                write!(f, "contribution point already registered: {id}")
            }
        }
    }
}

impl Error for HostError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidManifest(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ManifestValidationError> for HostError {
    fn from(value: ManifestValidationError) -> Self {
        Self::InvalidManifest(value)
    }
}
