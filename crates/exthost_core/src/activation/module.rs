//! Extension module and module loader contracts.

use crate::extension::context::ExtensionContext;
use crate::extension::record::Exports;
use async_trait::async_trait;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Failure raised by extension code or a module loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleError {
    message: String,
}

impl ModuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ModuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ModuleError {}

impl From<String> for ModuleError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ModuleError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

pub type ModuleResult<T> = Result<T, ModuleError>;

/// Executable half of an extension.
///
/// Both hooks are optional; the defaults export nothing and release nothing.
#[async_trait(?Send)]
pub trait ExtensionModule {
    /// Called once per activation with the exports of each declared
    /// dependency, in declaration order. The return value becomes the
    /// extension's exports.
    async fn activate(
        &self,
        _context: &ExtensionContext,
        _dependencies: Vec<Option<Exports>>,
    ) -> ModuleResult<Option<Exports>> {
        Ok(None)
    }

    async fn deactivate(&self, _context: &ExtensionContext) -> ModuleResult<()> {
        Ok(())
    }
}

/// Resolves a module path to a loaded module.
#[async_trait(?Send)]
pub trait ModuleLoader {
    async fn load_module(&self, path: &Path) -> ModuleResult<Rc<dyn ExtensionModule>>;
}

/// Loader over an in-memory path → module table, for hosts that embed their
/// extensions at build time.
#[derive(Default)]
pub struct StaticModuleLoader {
    modules: RefCell<HashMap<PathBuf, Rc<dyn ExtensionModule>>>,
    loads: Cell<usize>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, path: impl Into<PathBuf>, module: Rc<dyn ExtensionModule>) -> Self {
        self.insert(path, module);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, module: Rc<dyn ExtensionModule>) {
        self.modules.borrow_mut().insert(path.into(), module);
    }

    /// Successful loads so far.
    pub fn load_count(&self) -> usize {
        self.loads.get()
    }
}

#[async_trait(?Send)]
impl ModuleLoader for StaticModuleLoader {
    async fn load_module(&self, path: &Path) -> ModuleResult<Rc<dyn ExtensionModule>> {
        let module = self
            .modules
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| ModuleError::new(format!("no module at `{}`", path.display())))?;
        self.loads.set(self.loads.get() + 1);
        Ok(module)
    }
}
