//! When-clause expression engine.
//!
//! # Responsibility
//! - Compile declarative visibility conditions into cached predicates.
//! - Evaluate predicates against the ambient framework context.
//!
//! # Invariants
//! - Compile errors surface synchronously; runtime faults never do.
//! - Bare names missing from the context resolve per [`UnknownNamePolicy`].

pub mod ast;
pub mod compiler;
pub mod parser;
pub mod scanner;
pub mod value;

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use ast::WhenEvalError;
pub use compiler::{compile_when_clause, shared_compiler, WhenClause, WhenCompiler};
pub use value::{context_from_json, ContextMap, NativeFunction, Value};

/// How a bare name absent from the context evaluates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownNamePolicy {
    /// Evaluates to `undefined`.
    Undefined,
    /// Evaluates to the name itself, so `view == explorer` reads like a string match.
    #[default]
    NameAsString,
    /// Faults the evaluation (the predicate then returns `false`).
    Error,
}

/// Clause compilation errors. Positions are character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhenParseError {
    Empty,
    UnterminatedString { position: usize },
    UnknownOperator { operator: String, position: usize },
    MissingClosingToken { expected: String, position: usize },
    UnexpectedToken { token: String, position: usize },
    UnexpectedEnd { position: usize },
    TooDeep { limit: usize, position: usize },
}

impl Display for WhenParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "when clause is empty"),
            Self::UnterminatedString { position } => {
                write!(f, "unterminated string starting at position {position}")
            }
            Self::UnknownOperator { operator, position } => {
                write!(f, "unknown operator `{operator}` at position {position}")
            }
            Self::MissingClosingToken { expected, position } => {
                write!(f, "missing closing `{expected}` at position {position}")
            }
            Self::UnexpectedToken { token, position } => {
                write!(f, "unexpected token `{token}` at position {position}")
            }
            Self::UnexpectedEnd { position } => {
                write!(f, "unexpected end of clause at position {position}")
            }
            Self::TooDeep { limit, position } => {
                write!(f, "clause nests deeper than {limit} levels at position {position}")
            }
        }
    }
}

impl Error for WhenParseError {}
