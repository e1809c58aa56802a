//! Compile-time symbol tables.
//!
//! Each script or lambda body gets one [`Scope`]: an ordered slot table of
//! parameters and locals. While a body is being parsed the table lives in a
//! [`ScopeStack`], which also tracks the lexical block structure used for
//! shadow detection. When parsing of a body completes the table is frozen
//! into an immutable `Scope` owned by the compiled script.
//!
//! # Capture
//!
//! Resolving a name that lives in an enclosing function scope threads a
//! capture chain through every intermediate scope: each scope on the way
//! gets a capture symbol whose frame slot is linked (by reference, not by
//! copy) to the defining frame's slot at closure-construction time. The
//! flag propagation mirrors classic cell/free-variable analysis.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

bitflags! {
    /// Properties of a declared symbol.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SymbolFlags: u8 {
        /// Declared in the parameter list.
        const PARAMETER = 1 << 0;
        /// Block-scoped (`let` / `const`), subject to shading rules.
        const LEXICAL = 1 << 1;
        /// Assignment after declaration is a parse error.
        const CONST = 1 << 2;
        /// Referenced from a nested function; frame slot is a shared cell.
        const CAPTURED = 1 << 3;
        /// Capture symbol: linked from the defining frame, not declared here.
        const UPVALUE = 1 << 4;
    }
}

/// A named, slot-indexed local variable or parameter.
#[derive(Clone, Debug)]
pub struct Symbol {
    name: Arc<str>,
    slot: usize,
    flags: SymbolFlags,
}

impl Symbol {
    /// Symbol name as declared in source.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Frame slot index, unique within the owning scope.
    #[inline]
    pub fn slot(&self) -> usize {
        self.slot
    }

    #[inline]
    pub fn flags(&self) -> SymbolFlags {
        self.flags
    }

    #[inline]
    pub fn is_captured(&self) -> bool {
        self.flags.contains(SymbolFlags::CAPTURED)
    }

    #[inline]
    pub fn is_const(&self) -> bool {
        self.flags.contains(SymbolFlags::CONST)
    }

    #[inline]
    pub fn is_lexical(&self) -> bool {
        self.flags.contains(SymbolFlags::LEXICAL)
    }
}

/// Link between an inner scope's capture symbol and the defining frame.
///
/// `outer_slot` indexes the immediately enclosing scope's frame (which may
/// itself hold a threaded capture), `inner_slot` this scope's frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capture {
    pub outer_slot: usize,
    pub inner_slot: usize,
}

/// Frozen symbol table for one script or lambda body.
///
/// Immutable after parse; owned by the compiled script and shared with
/// every frame created for it.
#[derive(Clone, Debug)]
pub struct Scope {
    symbols: Box<[Symbol]>,
    param_count: usize,
    captures: Box<[Capture]>,
}

impl Scope {
    /// Empty scope with no parameters, for synthesized scripts.
    pub fn empty() -> Self {
        Scope {
            symbols: Box::new([]),
            param_count: 0,
            captures: Box::new([]),
        }
    }

    /// Number of frame slots a frame for this scope needs.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.symbols.len()
    }

    /// Number of declared parameters; parameter slots are `0..param_count`.
    #[inline]
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    /// Symbol occupying `slot`.
    #[inline]
    pub fn symbol(&self, slot: usize) -> Option<&Symbol> {
        self.symbols.get(slot)
    }

    /// All symbols in slot order.
    #[inline]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Slots to link from the defining frame at closure construction.
    #[inline]
    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }
}

/// Declaration kind for locals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclKind {
    /// Function-scoped, redeclarable (`var`).
    Var,
    /// Block-scoped (`let`).
    Let,
    /// Block-scoped and immutable (`const`).
    Const,
}

/// Error raised while building a scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeError {
    /// A lexical name was redeclared while still visible.
    Redeclared { name: Arc<str> },
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::Redeclared { name } => {
                write!(f, "variable '{name}' is already declared in this scope")
            }
        }
    }
}

impl std::error::Error for ScopeError {}

/// Result of resolving an identifier against the scope stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedSymbol {
    /// Frame slot in the innermost (current) scope.
    pub slot: usize,
    /// Assignment must be rejected.
    pub constant: bool,
}

/// One function-level scope under construction.
struct ScopeBuilder {
    symbols: Vec<Symbol>,
    param_count: usize,
    captures: Vec<Capture>,
    /// Innermost visible slot per name.
    visible: FxHashMap<Arc<str>, usize>,
    /// Per-block undo log: (name, previously visible slot).
    blocks: Vec<Vec<(Arc<str>, Option<usize>)>>,
}

impl ScopeBuilder {
    fn new() -> Self {
        ScopeBuilder {
            symbols: Vec::new(),
            param_count: 0,
            captures: Vec::new(),
            visible: FxHashMap::default(),
            blocks: vec![Vec::new()],
        }
    }

    fn bind(&mut self, name: Arc<str>, slot: usize) {
        let old = self.visible.insert(Arc::clone(&name), slot);
        if let Some(log) = self.blocks.last_mut() {
            log.push((name, old));
        }
    }

    fn push_symbol(&mut self, name: Arc<str>, flags: SymbolFlags) -> usize {
        let slot = self.symbols.len();
        self.symbols.push(Symbol {
            name: Arc::clone(&name),
            slot,
            flags,
        });
        self.bind(name, slot);
        slot
    }

    fn finish(self) -> Scope {
        Scope {
            symbols: self.symbols.into_boxed_slice(),
            param_count: self.param_count,
            captures: self.captures.into_boxed_slice(),
        }
    }
}

/// Parse-time stack of function scopes and lexical blocks.
///
/// The parser drives this: one `enter_function`/`exit_function` pair per
/// script or lambda body, one `enter_block`/`exit_block` pair per brace
/// block, loop body, or branch. Only const-ness and capture flags survive
/// on the frozen symbols; the block structure itself leaves no trace.
pub struct ScopeStack {
    scopes: Vec<ScopeBuilder>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack { scopes: Vec::new() }
    }

    /// Open a function-level scope (script body or lambda body).
    pub fn enter_function(&mut self) {
        self.scopes.push(ScopeBuilder::new());
    }

    /// Close the innermost function scope and freeze its symbol table.
    ///
    /// Returns `Scope::empty()` if no scope is open, which only happens on
    /// parser bugs; callers treat the stack as balanced.
    pub fn exit_function(&mut self) -> Scope {
        self.scopes.pop().map_or_else(Scope::empty, ScopeBuilder::finish)
    }

    /// Open a lexical block inside the current function scope.
    pub fn enter_block(&mut self) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.blocks.push(Vec::new());
        }
    }

    /// Close the innermost lexical block, restoring shadowed bindings.
    pub fn exit_block(&mut self) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        let Some(log) = scope.blocks.pop() else {
            return;
        };
        for (name, old) in log.into_iter().rev() {
            match old {
                Some(slot) => {
                    scope.visible.insert(name, slot);
                }
                None => {
                    scope.visible.remove(&name);
                }
            }
        }
    }

    /// Declare a parameter in the innermost function scope.
    ///
    /// Parameters occupy the leading slots in declaration order.
    pub fn declare_parameter(&mut self, name: &str) -> usize {
        let Some(scope) = self.scopes.last_mut() else {
            return 0;
        };
        let slot = scope.push_symbol(Arc::from(name), SymbolFlags::PARAMETER);
        scope.param_count = scope.symbols.len();
        slot
    }

    /// Declare a local in the innermost function scope.
    ///
    /// `var` reuses an already-visible non-lexical symbol of the same name;
    /// redeclaring a visible lexical name (or declaring a lexical name over
    /// any visible one) is an error.
    pub fn declare_local(&mut self, name: &str, kind: DeclKind) -> Result<usize, ScopeError> {
        let Some(scope) = self.scopes.last_mut() else {
            return Ok(0);
        };
        if let Some(&slot) = scope.visible.get(name) {
            let existing_lexical = scope.symbols[slot].is_lexical();
            match kind {
                DeclKind::Var if !existing_lexical => return Ok(slot),
                _ => {
                    return Err(ScopeError::Redeclared {
                        name: Arc::from(name),
                    })
                }
            }
        }
        let flags = match kind {
            DeclKind::Var => SymbolFlags::empty(),
            DeclKind::Let => SymbolFlags::LEXICAL,
            DeclKind::Const => SymbolFlags::LEXICAL | SymbolFlags::CONST,
        };
        Ok(scope.push_symbol(Arc::from(name), flags))
    }

    /// Resolve an identifier against the stack.
    ///
    /// A hit in an enclosing function scope threads capture symbols through
    /// every scope crossed and marks each symbol on the chain captured.
    /// `None` means the name is free: it resolves through the host context
    /// at evaluation time.
    pub fn resolve(&mut self, name: &str) -> Option<ResolvedSymbol> {
        let innermost = self.scopes.len().checked_sub(1)?;
        let (found_depth, mut slot) = self
            .scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, scope)| scope.visible.get(name).map(|&s| (depth, s)))?;

        let constant = self.scopes[found_depth].symbols[slot].is_const();
        if found_depth == innermost {
            return Some(ResolvedSymbol { slot, constant });
        }

        // Thread the capture chain outward-in.
        self.scopes[found_depth].symbols[slot].flags |= SymbolFlags::CAPTURED;
        for depth in (found_depth + 1)..=innermost {
            let outer_slot = slot;
            let scope = &mut self.scopes[depth];
            // Reuse an already-threaded upvalue for this name.
            if let Some(&existing) = scope.visible.get(name) {
                if scope.symbols[existing].flags.contains(SymbolFlags::UPVALUE) {
                    slot = existing;
                    continue;
                }
            }
            let mut flags = SymbolFlags::UPVALUE | SymbolFlags::CAPTURED;
            if constant {
                flags |= SymbolFlags::CONST;
            }
            slot = scope.push_symbol(Arc::from(name), flags);
            scope.captures.push(Capture {
                outer_slot,
                inner_slot: slot,
            });
        }
        Some(ResolvedSymbol { slot, constant })
    }

    /// Whether any function scope is currently open.
    #[inline]
    pub fn in_function(&self) -> bool {
        !self.scopes.is_empty()
    }

    /// Symbol occupying `slot` in the innermost open scope.
    ///
    /// Lets the parser check const-ness of an already-resolved assignment
    /// target.
    pub fn current_symbol(&self, slot: usize) -> Option<&Symbol> {
        self.scopes.last().and_then(|s| s.symbols.get(slot))
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        ScopeStack::new()
    }
}
