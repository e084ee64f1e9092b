//! Clause compilation cache.
//!
//! # Invariants
//! - Character-identical clause text always yields the same `Arc<WhenClause>`.
//! - Parse failures are returned to the caller and never cached.
//! - Runtime faults are logged at most once per compiled clause.

use super::ast::{Expr, Scope, WhenEvalError};
use super::parser::parse;
use super::value::{ContextMap, Value};
use super::{UnknownNamePolicy, WhenParseError};
use log::{debug, warn};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

static SHARED_COMPILER: Lazy<WhenCompiler> =
    Lazy::new(|| WhenCompiler::new(UnknownNamePolicy::NameAsString));

/// Compiles `clause` with the process-wide compiler (name-as-string policy).
pub fn compile_when_clause(clause: &str) -> Result<Arc<WhenClause>, WhenParseError> {
    SHARED_COMPILER.compile(clause)
}

/// Returns the process-wide compiler.
pub fn shared_compiler() -> &'static WhenCompiler {
    &SHARED_COMPILER
}

/// A compiled predicate together with its source text.
pub struct WhenClause {
    source: String,
    expr: Expr,
    policy: UnknownNamePolicy,
    fault_logged: AtomicBool,
}

impl WhenClause {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn policy(&self) -> UnknownNamePolicy {
        self.policy
    }

    /// Evaluates against `context`; faults evaluate to `false`.
    pub fn evaluate(&self, context: &ContextMap) -> bool {
        self.evaluate_with(context, self.policy)
    }

    /// Same as [`WhenClause::evaluate`] with an explicit name policy.
    pub fn evaluate_with(&self, context: &ContextMap, policy: UnknownNamePolicy) -> bool {
        match self.try_evaluate_with(context, policy) {
            Ok(value) => value.is_truthy(),
            Err(err) => {
                if !self.fault_logged.swap(true, Ordering::Relaxed) {
                    warn!(
                        "event=when_eval module=when status=error clause={:?} error={}",
                        self.source, err
                    );
                }
                false
            }
        }
    }

    /// Raw evaluation result, faults included.
    pub fn try_evaluate(&self, context: &ContextMap) -> Result<Value, WhenEvalError> {
        self.try_evaluate_with(context, self.policy)
    }

    fn try_evaluate_with(
        &self,
        context: &ContextMap,
        policy: UnknownNamePolicy,
    ) -> Result<Value, WhenEvalError> {
        self.expr.evaluate(&Scope { context, policy })
    }
}

impl Debug for WhenClause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhenClause")
            .field("source", &self.source)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Clauses compare by source text and name policy.
impl PartialEq for WhenClause {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.policy == other.policy
    }
}

/// Text → predicate cache.
pub struct WhenCompiler {
    policy: UnknownNamePolicy,
    cache: Mutex<HashMap<String, Arc<WhenClause>>>,
}

impl WhenCompiler {
    pub fn new(policy: UnknownNamePolicy) -> Self {
        Self {
            policy,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> UnknownNamePolicy {
        self.policy
    }

    /// Returns the cached predicate for `clause`, compiling it on first use.
    ///
    /// # Errors
    /// - Returns [`WhenParseError`] for malformed clauses; nothing is cached.
    pub fn compile(&self, clause: &str) -> Result<Arc<WhenClause>, WhenParseError> {
        if let Some(hit) = self.lock().get(clause) {
            return Ok(Arc::clone(hit));
        }

        let expr = parse(clause)?;
        let compiled = Arc::new(WhenClause {
            source: clause.to_string(),
            expr,
            policy: self.policy,
            fault_logged: AtomicBool::new(false),
        });
        debug!(
            "event=when_compile module=when status=ok clause={:?}",
            clause
        );

        // Another caller may have compiled the same text meanwhile; keep the first.
        let mut cache = self.lock();
        let entry = cache
            .entry(clause.to_string())
            .or_insert_with(|| Arc::clone(&compiled));
        Ok(Arc::clone(entry))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<WhenClause>>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for WhenCompiler {
    fn default() -> Self {
        Self::new(UnknownNamePolicy::NameAsString)
    }
}

#[cfg(test)]
mod tests {
    use super::{compile_when_clause, WhenCompiler};
    use crate::when::value::{ContextMap, Value};
    use crate::when::UnknownNamePolicy;
    use std::sync::Arc;

    fn ctx(pairs: &[(&str, Value)]) -> ContextMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn identical_text_shares_one_predicate() {
        let first = compile_when_clause("panel == 'left'").expect("compile");
        let second = compile_when_clause("panel == 'left'").expect("compile");
        assert!(Arc::ptr_eq(&first, &second));

        let spaced = compile_when_clause("panel  == 'left'").expect("compile");
        assert!(!Arc::ptr_eq(&first, &spaced));
    }

    #[test]
    fn parse_errors_are_not_cached() {
        let compiler = WhenCompiler::new(UnknownNamePolicy::Undefined);
        compiler.compile("a ==").expect_err("malformed clause must fail");
        assert!(compiler.is_empty());
        compiler.compile("a == 1").expect("compile");
        assert_eq!(compiler.len(), 1);
    }

    #[test]
    fn unknown_name_policies_differ() {
        let context = ContextMap::new();

        let as_string = WhenCompiler::new(UnknownNamePolicy::NameAsString);
        let clause = as_string.compile("mode == edit").expect("compile");
        assert!(!clause.evaluate(&context));
        assert!(clause.evaluate(&ctx(&[("mode", Value::from("edit"))])));
        assert_eq!(
            clause.try_evaluate(&ContextMap::new()).expect("eval"),
            Value::Bool(false)
        );

        let undefined = WhenCompiler::new(UnknownNamePolicy::Undefined);
        let clause = undefined.compile("missing == undefined").expect("compile");
        assert!(clause.evaluate(&context));

        let strict = WhenCompiler::new(UnknownNamePolicy::Error);
        let clause = strict.compile("missing").expect("compile");
        assert!(clause.try_evaluate(&context).is_err());
        assert!(!clause.evaluate(&context));
    }

    #[test]
    fn runtime_faults_evaluate_to_false_repeatedly() {
        let clause = compile_when_clause("notAFunction()").expect("compile");
        let context = ctx(&[("notAFunction", Value::from(3))]);
        for _ in 0..3 {
            assert!(!clause.evaluate(&context));
        }
    }
}
