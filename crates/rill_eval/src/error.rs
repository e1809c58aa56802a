//! Evaluation errors.
//!
//! `EvalErrorKind` is the typed category; factory functions are the
//! construction surface, and the evaluator attaches node spans as the
//! error propagates out. A user-level `throw` carries its script value.

use std::sync::Arc;

use thiserror::Error;

use rill_ir::{BinaryOp, Span};

use crate::value::Value;

/// Typed evaluation error category.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EvalErrorKind {
    #[error("undefined variable '{name}'")]
    UndefinedVariable { name: Arc<str> },

    #[error("local variable '{name}' referenced before its declaration")]
    UnboundLocal { name: Arc<str> },

    #[error("division by zero")]
    DivisionByZero,

    #[error("modulo by zero")]
    ModuloByZero,

    #[error("operator '{op}' undefined for {left} and {right}")]
    InvalidOperands {
        op: BinaryOp,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot coerce {type_name} value '{text}' to a number")]
    NumberCoercion {
        type_name: &'static str,
        text: String,
    },

    #[error("null operand for operator '{op}'")]
    NullOperand { op: BinaryOp },

    #[error("{type_name} value has no member '{name}'")]
    NoSuchMember {
        type_name: &'static str,
        name: String,
    },

    #[error("call to '{name}' failed: {message}")]
    InvocationFailed { name: String, message: String },

    #[error("{type_name} value is not callable")]
    NotCallable { type_name: &'static str },

    #[error("wrong number of arguments: expected {expected}, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    #[error("cannot iterate over {type_name} value")]
    NotIterable { type_name: &'static str },

    #[error("cannot assign to this expression")]
    InvalidAssignTarget,

    #[error("script error: {0}")]
    UserThrown(Value),

    #[error("evaluation cancelled")]
    Cancelled,

    #[error("{0}")]
    Internal(String),
}

/// An evaluation error, with the originating node position once known.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub span: Option<Span>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        EvalError { kind, span: None }
    }

    /// Attach a span if none is present; inner positions win.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span.get_or_insert(span);
        self
    }

    /// The value a `catch` clause binds for this error: the thrown value
    /// for user throws, the message string otherwise.
    pub fn to_value(&self) -> Value {
        match &self.kind {
            EvalErrorKind::UserThrown(v) => v.clone(),
            kind => Value::string(kind.to_string()),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.kind.fmt(f)
    }
}

impl std::error::Error for EvalError {}

// Factory functions; the canonical construction surface.

pub fn undefined_variable(name: &str) -> EvalError {
    EvalError::new(EvalErrorKind::UndefinedVariable {
        name: Arc::from(name),
    })
}

pub fn unbound_local(name: &str) -> EvalError {
    EvalError::new(EvalErrorKind::UnboundLocal {
        name: Arc::from(name),
    })
}

pub fn division_by_zero() -> EvalError {
    EvalError::new(EvalErrorKind::DivisionByZero)
}

pub fn modulo_by_zero() -> EvalError {
    EvalError::new(EvalErrorKind::ModuloByZero)
}

pub fn invalid_operands(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    EvalError::new(EvalErrorKind::InvalidOperands {
        op,
        left: left.type_name(),
        right: right.type_name(),
    })
}

pub fn number_coercion(value: &Value) -> EvalError {
    EvalError::new(EvalErrorKind::NumberCoercion {
        type_name: value.type_name(),
        text: value.to_string(),
    })
}

pub fn null_operand(op: BinaryOp) -> EvalError {
    EvalError::new(EvalErrorKind::NullOperand { op })
}

pub fn no_such_member(target: &Value, name: &str) -> EvalError {
    EvalError::new(EvalErrorKind::NoSuchMember {
        type_name: target.type_name(),
        name: name.to_owned(),
    })
}

pub fn invocation_failed(name: &str, message: impl Into<String>) -> EvalError {
    EvalError::new(EvalErrorKind::InvocationFailed {
        name: name.to_owned(),
        message: message.into(),
    })
}

pub fn not_callable(value: &Value) -> EvalError {
    EvalError::new(EvalErrorKind::NotCallable {
        type_name: value.type_name(),
    })
}

pub fn arity_mismatch(expected: usize, got: usize) -> EvalError {
    EvalError::new(EvalErrorKind::ArityMismatch { expected, got })
}

pub fn not_iterable(value: &Value) -> EvalError {
    EvalError::new(EvalErrorKind::NotIterable {
        type_name: value.type_name(),
    })
}

pub fn invalid_assign_target() -> EvalError {
    EvalError::new(EvalErrorKind::InvalidAssignTarget)
}

pub fn user_thrown(value: Value) -> EvalError {
    EvalError::new(EvalErrorKind::UserThrown(value))
}

pub fn cancelled() -> EvalError {
    EvalError::new(EvalErrorKind::Cancelled)
}

pub fn internal(message: impl Into<String>) -> EvalError {
    EvalError::new(EvalErrorKind::Internal(message.into()))
}
