//! In-process extension host.
//!
//! Extensions declare what they contribute in a JSON manifest and provide
//! behavior through an [`ExtensionModule`]. The host validates and indexes
//! manifest contributions, activates extensions (dependencies first) when
//! their activation events fire, and resolves code contributions lazily.
//! `when` clauses gate contributions against the framework context.

pub mod activation;
pub mod config;
pub mod contribution;
pub mod disposable;
pub mod extension;
pub mod host;
pub mod logging;
pub mod store;
pub mod when;

pub use activation::{ExtensionModule, ModuleError, ModuleLoader, ModuleResult, StaticModuleLoader};
pub use config::{ConfigError, HostConfig};
pub use contribution::builtin::register_builtin_points;
pub use contribution::keybinding::normalize_key;
pub use contribution::{
    CodeValue, Contribution, ContributionError, ContributionPoint, ContributionProcessError,
};
pub use disposable::Disposable;
pub use extension::{
    Exports, Extension, ExtensionContext, ExtensionError, ExtensionHandle, ExtensionManifest,
    ExtensionStatus, RegisterOptions,
};
pub use host::{ExtensionHost, HostError, HostResult, WeakHost};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use when::{compile_when_clause, ContextMap, UnknownNamePolicy, Value, WhenClause};

/// Minimal health-check API for embedders.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
