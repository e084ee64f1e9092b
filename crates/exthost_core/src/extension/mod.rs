//! Extension declarations, lifecycle records and contexts.
//!
//! Registration itself lives in [`registry`] as methods on
//! `ExtensionHost`; this module owns the data those methods move around.

pub mod context;
pub mod error;
pub mod manifest;
pub mod record;
pub mod registry;

pub use context::{ExtensionContext, ExtensionContextData, PathResolver, RegisterOptions};
pub use error::ExtensionError;
pub use manifest::{ExtensionManifest, ManifestValidationError};
pub use record::{Exports, Extension, ExtensionStatus};
pub use registry::ExtensionHandle;
