//! Control signals for statement execution.
//!
//! Every statement execution produces either a normal value or an unwind
//! signal, propagated by ordinary `Result`/`?` control flow - never by
//! panics. Loops intercept `Break`/`Continue`, function boundaries
//! intercept `Return`, `try/catch` intercepts `Thrown`; `Cancelled`
//! unwinds like `Thrown` but nothing catches it.

use rill_ir::Span;

use crate::error::EvalError;
use crate::value::Value;

/// Non-normal outcome of executing a node.
#[derive(Clone, Debug, PartialEq)]
pub enum Unwind {
    /// `break`, carrying its position for stray-signal diagnostics.
    Break(Span),
    /// `continue`, carrying its position for stray-signal diagnostics.
    Continue(Span),
    /// `return`, carrying the returned value to the function boundary.
    Return(Value),
    /// A thrown error, catchable by `try/catch`.
    Thrown(EvalError),
    /// Cooperative cancellation; runs `finally` blocks but is uncatchable.
    Cancelled,
}

/// Result of evaluating a node: a value, or an unwind signal.
pub type Eval = Result<Value, Unwind>;

impl From<EvalError> for Unwind {
    fn from(err: EvalError) -> Self {
        Unwind::Thrown(err)
    }
}
