//! Rill - an embeddable expression and scripting language.
//!
//! Hosts hand the [`Engine`] source text and a variable [`Context`];
//! the engine parses (through a bounded LRU script cache), walks the
//! tree, and hands back a [`Value`]. The accepted language surface is
//! configured per engine with [`Features`], and evaluation policy with
//! the strict toggle.
//!
//! ```
//! use rill::{Engine, MapContext, Value};
//!
//! let engine = Engine::new();
//! let mut ctx = MapContext::new().with("price", Value::Int(40));
//! let total = engine.eval("price * 2 + 1", &mut ctx).unwrap();
//! assert_eq!(total, Value::Int(81));
//! ```

mod cache;
mod engine;
mod report;

pub use cache::{AuxCache, ScriptCache, SourceKey};
pub use engine::{Engine, EngineBuilder, Error};
pub use report::LineIndex;

pub use rill_eval::{
    Arithmetic, Context, EvalError, EvalErrorKind, Evaluator, Lookup, MapContext, ObjectModel,
    SharedModel, StandardModel, Value,
};
pub use rill_ir::{Features, Script, Span};
pub use rill_parse::{parse, ParseError, ParseErrorKind};
