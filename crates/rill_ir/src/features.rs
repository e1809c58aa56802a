//! Parse-time language feature set.
//!
//! Hosts restrict the language surface per call site: a rule engine may
//! allow pure expressions only, a scripting endpoint the full statement
//! language. The feature set participates in script-cache keying because
//! the same text parses differently (or not at all) under different sets.

use bitflags::bitflags;

bitflags! {
    /// Language constructs the parser will accept.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Features: u16 {
        /// `while`, `do/while`, `for`, `foreach`, `break`, `continue`.
        const LOOPS = 1 << 0;
        /// Lambda literals and local function values.
        const LAMBDAS = 1 << 1;
        /// Assignments to globals and property/index writes.
        const SIDE_EFFECTS = 1 << 2;
        /// Block-scoped `let` / `const` declarations.
        const LEXICAL = 1 << 3;
        /// Strict shading: reading a lexical symbol before its declaration
        /// point is an error instead of falling through to the context.
        const LEXICAL_SHADE = 1 << 4;
        /// Method calls on values (`x.foo()`).
        const METHOD_CALLS = 1 << 5;
        /// `new "class" (...)` constructor calls through the object model.
        const CONSTRUCTORS = 1 << 6;
    }
}

impl Default for Features {
    /// Everything except strict shading.
    fn default() -> Self {
        Features::all() - Features::LEXICAL_SHADE
    }
}

impl Features {
    /// Expression-only subset: no loops, no lambdas, no side effects.
    ///
    /// Suitable for condition evaluation over read-only data.
    pub fn expression_only() -> Self {
        Features::LEXICAL | Features::METHOD_CALLS
    }
}
