//! Parse-time constants.
//!
//! Literal nodes pre-compute their value when the parser closes them. A
//! composite literal whose children are all constant is folded into a
//! single [`Constant`] so evaluation never rebuilds it element by element.

use std::sync::Arc;

/// Value of a constant subtree, computed at parse close.
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    /// Folded array literal.
    Array(Arc<[Constant]>),
    /// Folded map literal; key coercion happens at evaluation time.
    Map(Arc<[(Constant, Constant)]>),
}

impl Constant {
    /// String constant from a borrowed slice.
    pub fn str(s: &str) -> Self {
        Constant::Str(Arc::from(s))
    }
}
