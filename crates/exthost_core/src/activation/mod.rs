//! Extension activation: module contracts and the lifecycle engine.

pub mod engine;
pub mod module;

pub use module::{ExtensionModule, ModuleError, ModuleLoader, ModuleResult, StaticModuleLoader};
