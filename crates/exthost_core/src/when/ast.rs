//! Parsed when-clause tree and its evaluator.

use super::value::{ContextMap, Value};
use super::UnknownNamePolicy;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Name(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Property {
        object: Box<Expr>,
        name: String,
    },
}

/// Evaluation fault. Never crosses the predicate boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhenEvalError {
    UnknownName(String),
    NotCallable(String),
    FunctionFailed { name: String, message: String },
    NullAccess { property: String, target: &'static str },
    InvalidMembershipTarget(&'static str),
}

impl Display for WhenEvalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownName(name) => write!(f, "`{name}` is not defined"),
            Self::NotCallable(kind) => write!(f, "value of type {kind} is not a function"),
            Self::FunctionFailed { name, message } => {
                write!(f, "call to `{name}` failed: {message}")
            }
            Self::NullAccess { property, target } => {
                write!(f, "cannot read property `{property}` of {target}")
            }
            Self::InvalidMembershipTarget(kind) => {
                write!(f, "cannot use `in` to search a value of type {kind}")
            }
        }
    }
}

impl Error for WhenEvalError {}

/// Evaluation environment for one predicate call.
pub struct Scope<'a> {
    pub context: &'a ContextMap,
    pub policy: UnknownNamePolicy,
}

impl Expr {
    pub fn evaluate(&self, scope: &Scope<'_>) -> Result<Value, WhenEvalError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Name(name) => resolve_name(name, scope),
            Self::Unary { op, operand } => {
                let value = operand.evaluate(scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Negate => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                })
            }
            Self::Logical { op, left, right } => {
                let left = left.evaluate(scope)?;
                match (op, left.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                    _ => right.evaluate(scope),
                }
            }
            Self::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if test.evaluate(scope)?.is_truthy() {
                    consequent.evaluate(scope)
                } else {
                    alternate.evaluate(scope)
                }
            }
            Self::Binary { op, left, right } => {
                let left = left.evaluate(scope)?;
                let right = right.evaluate(scope)?;
                apply_binary(*op, &left, &right)
            }
            Self::Call { callee, args } => {
                let target = callee.evaluate(scope)?;
                let Value::Function(function) = target else {
                    return Err(WhenEvalError::NotCallable(target.type_name().to_string()));
                };
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                function(&args).map_err(|message| WhenEvalError::FunctionFailed {
                    name: callee.describe(),
                    message,
                })
            }
            Self::Index { object, index } => {
                let object = object.evaluate(scope)?;
                let index = index.evaluate(scope)?;
                member(&object, &index)
            }
            Self::Property { object, name } => {
                let object = object.evaluate(scope)?;
                member(&object, &Value::String(name.clone()))
            }
        }
    }

    /// Short rendering used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Name(name) => name.clone(),
            Self::Property { object, name } => format!("{}.{name}", object.describe()),
            Self::Literal(value) => value.to_display_string(),
            _ => "<expression>".to_string(),
        }
    }
}

fn resolve_name(name: &str, scope: &Scope<'_>) -> Result<Value, WhenEvalError> {
    if let Some(value) = scope.context.get(name) {
        return Ok(value.clone());
    }
    match scope.policy {
        UnknownNamePolicy::Undefined => Ok(Value::Undefined),
        UnknownNamePolicy::NameAsString => Ok(Value::String(name.to_string())),
        UnknownNamePolicy::Error => Err(WhenEvalError::UnknownName(name.to_string())),
    }
}

fn member(object: &Value, key: &Value) -> Result<Value, WhenEvalError> {
    match object {
        Value::Undefined | Value::Null => Err(WhenEvalError::NullAccess {
            property: key.to_display_string(),
            target: object.type_name(),
        }),
        Value::Array(items) => {
            if let Some(index) = array_index(key) {
                return Ok(items.get(index).cloned().unwrap_or_default());
            }
            if key.to_display_string() == "length" {
                return Ok(Value::Number(items.len() as f64));
            }
            Ok(Value::Undefined)
        }
        Value::String(text) => {
            if let Some(index) = array_index(key) {
                return Ok(text
                    .chars()
                    .nth(index)
                    .map(|c| Value::String(c.to_string()))
                    .unwrap_or_default());
            }
            if key.to_display_string() == "length" {
                return Ok(Value::Number(text.chars().count() as f64));
            }
            Ok(Value::Undefined)
        }
        Value::Object(map) => Ok(map
            .get(&key.to_display_string())
            .cloned()
            .unwrap_or_default()),
        Value::Bool(_) | Value::Number(_) | Value::Function(_) => Ok(Value::Undefined),
    }
}

fn array_index(key: &Value) -> Option<usize> {
    let number = match key {
        Value::Number(value) => *value,
        Value::String(text) => text.parse::<f64>().ok()?,
        _ => return None,
    };
    if number >= 0.0 && number.fract() == 0.0 && number <= usize::MAX as f64 {
        Some(number as usize)
    } else {
        None
    }
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, WhenEvalError> {
    let value = match op {
        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::Less => Value::Bool(left.loose_cmp(right) == Some(Ordering::Less)),
        BinaryOp::LessEq => Value::Bool(matches!(
            left.loose_cmp(right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Greater => Value::Bool(left.loose_cmp(right) == Some(Ordering::Greater)),
        BinaryOp::GreaterEq => Value::Bool(matches!(
            left.loose_cmp(right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::In => Value::Bool(contains(right, left)?),
        BinaryOp::NotIn => Value::Bool(!contains(right, left)?),
        BinaryOp::Add => {
            let left = left.to_primitive();
            let right = right.to_primitive();
            if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
                Value::String(format!(
                    "{}{}",
                    left.to_display_string(),
                    right.to_display_string()
                ))
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
    };
    Ok(value)
}

/// Membership: sequences by loose equality, objects by key.
fn contains(container: &Value, needle: &Value) -> Result<bool, WhenEvalError> {
    match container {
        Value::Array(items) => Ok(items.iter().any(|item| item.loose_eq(needle))),
        Value::Object(map) => Ok(map.contains_key(&needle.to_display_string())),
        other => Err(WhenEvalError::InvalidMembershipTarget(other.type_name())),
    }
}
