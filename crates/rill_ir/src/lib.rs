//! Rill IR - AST, symbol/scope model, and compiled-script types.
//!
//! This crate holds everything the parser produces and the evaluator
//! consumes:
//!
//! - `Span`: compact source positions
//! - `Features`: parse-time language surface, part of cache identity
//! - `Symbol` / `Scope` / `ScopeStack`: slot-indexed symbol tables with
//!   lexical shadow detection and closure-capture threading
//! - `Expr` / `ExprKind`: the node model, one closed sum type per category
//! - `Script`: immutable compiled unit shared across evaluations

mod ast;
mod constant;
mod features;
mod script;
mod span;
mod symbol;

pub use ast::{
    walk_expr, AccessHint, BinaryOp, Expr, ExprKind, HintEntry, Lambda, LoopVar, SwitchCase,
    UnaryOp, VarRef, Visitor,
};
pub use constant::Constant;
pub use features::Features;
pub use script::Script;
pub use span::Span;
pub use symbol::{
    Capture, DeclKind, ResolvedSymbol, Scope, ScopeError, ScopeStack, Symbol, SymbolFlags,
};
