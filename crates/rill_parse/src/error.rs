//! Parse errors.

use thiserror::Error;

use rill_ir::Span;

/// What went wrong during lexing or parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },

    #[error("unrecognized character sequence '{text}'")]
    UnexpectedChar { text: String },

    #[error("{feature} are disabled for this script")]
    FeatureDisabled { feature: &'static str },

    #[error("'{name}' is already declared in this scope")]
    Redeclared { name: String },

    #[error("cannot assign to constant '{name}'")]
    ConstAssign { name: String },

    #[error("'break' outside of a loop")]
    BreakOutsideLoop,

    #[error("'continue' outside of a loop")]
    ContinueOutsideLoop,

    #[error("invalid assignment target")]
    InvalidAssignTarget,
}

/// A parse error with the source span it points at.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        ParseError { kind, span }
    }
}
