//! Framework context: the ambient map when-clauses evaluate against.

use super::ExtensionHost;
use crate::when::{compile_when_clause, ContextMap, Value, WhenClause, WhenParseError};
use log::debug;
use std::rc::Rc;

impl ExtensionHost {
    /// Merges `patch` into the framework context.
    pub fn update_framework_context<I, K>(&self, patch: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut store = self.inner.store.borrow_mut();
        let mut keys = 0;
        for (key, value) in patch {
            store.framework.set(key.into(), value);
            keys += 1;
        }
        debug!(
            "event=framework_context_update module=host status=ok keys={}",
            keys
        );
    }

    /// Replaces the whole framework context.
    pub fn replace_framework_context(&self, context: ContextMap) {
        self.inner
            .store
            .borrow_mut()
            .framework
            .replace_all(context);
    }

    pub fn framework_context(&self) -> Rc<ContextMap> {
        self.inner.store.borrow().framework.all()
    }

    /// Compiles `clause` and evaluates it against the framework context,
    /// using the configured unknown-name policy.
    pub fn evaluate_when(&self, clause: &str) -> Result<bool, WhenParseError> {
        let compiled = compile_when_clause(clause)?;
        Ok(self.when_holds(&compiled))
    }

    pub fn when_holds(&self, clause: &WhenClause) -> bool {
        let context = self.framework_context();
        clause.evaluate_with(&context, self.inner.config.unknown_names)
    }
}
