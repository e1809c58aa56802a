//! Runtime values.
//!
//! Scalars are inline; lists and maps are reference values (`Arc` behind a
//! lock), matching host-object semantics: two script variables bound to the
//! same list observe each other's mutations, and a list handed back to the
//! host is the same object the script built. Cross-thread mutation
//! visibility of a shared collection is the host's coordination problem.
//!
//! All heap allocation goes through factory methods on `Value`.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use rill_ir::{Constant, Lambda};

use crate::frame::CaptureCell;

/// Shared, mutable list storage.
pub type ListRef = Arc<RwLock<Vec<Value>>>;

/// Shared, mutable map storage. Keys are coerced to strings on access.
pub type MapRef = Arc<RwLock<FxHashMap<String, Value>>>;

/// A lambda closed over its captured frame slots.
#[derive(Debug)]
pub struct Closure {
    pub lambda: Arc<Lambda>,
    /// Cells for the lambda scope's capture list, in capture order.
    pub cells: Box<[CaptureCell]>,
}

/// Dynamically typed runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(ListRef),
    Map(MapRef),
    Closure(Arc<Closure>),
}

impl Value {
    /// String value from anything string-like.
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// Fresh list value.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items)))
    }

    /// Fresh map value.
    pub fn map(entries: FxHashMap<String, Value>) -> Self {
        Value::Map(Arc::new(RwLock::new(entries)))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Closure(_) => "function",
        }
    }
}

impl From<&Constant> for Value {
    fn from(c: &Constant) -> Self {
        match c {
            Constant::Null => Value::Null,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Int(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Str(s) => Value::Str(Arc::clone(s)),
            Constant::Array(items) => Value::list(items.iter().map(Value::from).collect()),
            Constant::Map(entries) => {
                let mut map = FxHashMap::default();
                for (k, v) in entries.iter() {
                    map.insert(constant_key(k), Value::from(v));
                }
                Value::map(map)
            }
        }
    }
}

/// Map-key form of a constant, matching the runtime string coercion.
fn constant_key(c: &Constant) -> String {
    Value::from(c).to_string()
}

/// Nesting depth past which collection equality and rendering stop
/// descending. Scripts can tie collections into reference cycles;
/// past this depth equality falls back to identity and rendering
/// elides the contents, so neither can recurse without bound.
const MAX_NESTING: usize = 64;

/// Structural equality; closures compare by identity, collections by
/// contents up to [`MAX_NESTING`] levels.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        eq_at(self, other, MAX_NESTING)
    }
}

fn eq_at(l: &Value, r: &Value, depth: usize) -> bool {
    match (l, r) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            Arc::ptr_eq(a, b)
                || (depth > 0 && {
                    let (a, b) = (a.read(), b.read());
                    a.len() == b.len()
                        && a.iter().zip(b.iter()).all(|(x, y)| eq_at(x, y, depth - 1))
                })
        }
        (Value::Map(a), Value::Map(b)) => {
            Arc::ptr_eq(a, b)
                || (depth > 0 && {
                    let (a, b) = (a.read(), b.read());
                    a.len() == b.len()
                        && a
                            .iter()
                            .all(|(k, v)| b.get(k).is_some_and(|w| eq_at(v, w, depth - 1)))
                })
        }
        (Value::Closure(a), Value::Closure(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

impl Value {
    fn fmt_at(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                if depth == 0 {
                    return f.write_str("[...]");
                }
                f.write_str("[")?;
                for (i, item) in items.read().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_at(f, depth - 1)?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                if depth == 0 {
                    return f.write_str("{...}");
                }
                f.write_str("{")?;
                for (i, (k, v)) in entries.read().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: ")?;
                    v.fmt_at(f, depth - 1)?;
                }
                f.write_str("}")
            }
            Value::Closure(_) => f.write_str("<function>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at(f, MAX_NESTING)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lists_are_reference_values() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::List(items) = &a {
            items.write().push(Value::Int(2));
        }
        if let Value::List(items) = &b {
            assert_eq!(items.read().len(), 2);
        } else {
            panic!("expected list");
        }
    }

    #[test]
    fn display_keeps_float_marker() {
        assert_eq!(Value::Float(7.0).to_string(), "7.0");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn cyclic_collections_compare_and_render_finitely() {
        let a = Value::list(vec![]);
        let b = Value::list(vec![]);
        if let (Value::List(xs), Value::List(ys)) = (&a, &b) {
            xs.write().push(b.clone());
            ys.write().push(a.clone());
        }
        // Mutually recursive lists: equality bottoms out at the nesting
        // cap instead of overflowing, identity still short-circuits.
        assert!(a != b);
        assert!(a == a);
        let rendered = a.to_string();
        assert!(rendered.starts_with('['));
        assert!(rendered.contains("[...]"));
    }

    #[test]
    fn constant_conversion_folds_composites() {
        let c = Constant::Array(Arc::from([Constant::Int(1), Constant::str("x")]));
        let v = Value::from(&c);
        assert_eq!(v.to_string(), "[1, x]");
    }
}
