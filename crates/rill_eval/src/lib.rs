//! Rill Eval - tree-walking evaluator and runtime for Rill scripts.
//!
//! # Architecture
//!
//! - `Arithmetic`: pure per-operator coercion engine with one
//!   strict/lenient policy toggle
//! - `Frame`: per-invocation slot array; captured slots are shared cells
//! - `Context`: host-supplied global variable store (trait)
//! - `ObjectModel`: property/method resolution over values (trait), with
//!   `StandardModel` covering map-like, sequence-like, and string shapes
//! - `Evaluator`: walks the AST with a frame, a context, and the
//!   arithmetic engine, propagating `Unwind` signals by ordinary
//!   `Result` control flow

mod arith;
mod context;
mod control;
pub mod error;
mod eval;
mod frame;
mod object;
mod stack;
mod value;

#[cfg(test)]
mod tests;

pub use arith::Arithmetic;
pub use context::{Context, MapContext};
pub use control::{Eval, Unwind};
pub use error::{EvalError, EvalErrorKind};
pub use eval::Evaluator;
pub use frame::{CaptureCell, Frame};
pub use object::{Lookup, ObjectModel, SharedModel, StandardModel};
pub use stack::with_sufficient_stack;
pub use value::{Closure, ListRef, MapRef, Value};
