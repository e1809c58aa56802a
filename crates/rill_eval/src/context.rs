//! Host-supplied variable context.
//!
//! The context is the global variable store: free names (anything not
//! resolved to a frame slot at parse time) read and write through it.
//! It is host-owned and unsynchronized by this crate; concurrent
//! evaluators sharing one context coordinate externally.

use rustc_hash::FxHashMap;

use crate::value::Value;

/// Global variable store injected per evaluation.
pub trait Context {
    /// Whether `name` is defined, even if bound to null.
    fn has(&self, name: &str) -> bool;

    /// Value bound to `name`; `None` when undefined (distinct from null).
    fn get(&self, name: &str) -> Option<Value>;

    /// Bind `name`, creating it if necessary.
    fn set(&mut self, name: &str, value: Value);
}

/// Map-backed context, sufficient for most hosts.
#[derive(Clone, Debug, Default)]
pub struct MapContext {
    vars: FxHashMap<String, Value>,
}

impl MapContext {
    pub fn new() -> Self {
        MapContext::default()
    }

    /// Builder-style insertion for test and host setup code.
    #[must_use]
    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.vars.insert(name.to_owned(), value);
        self
    }
}

impl Context for MapContext {
    fn has(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_owned(), value);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn undefined_is_distinct_from_null() {
        let ctx = MapContext::new().with("a", Value::Null);
        assert!(ctx.has("a"));
        assert_eq!(ctx.get("a"), Some(Value::Null));
        assert!(!ctx.has("b"));
        assert_eq!(ctx.get("b"), None);
    }
}
