//! Compiled scripts.

use std::sync::Arc;

use crate::ast::Expr;
use crate::features::Features;
use crate::symbol::Scope;

/// A finalized parse: AST root, its scope, and parse-time metadata.
///
/// Immutable after construction (the only interior mutability is the
/// idempotent `AccessHint` cells on member-access nodes), so one script is
/// safely shared across concurrent evaluations, each with its own frame.
#[derive(Debug)]
pub struct Script {
    body: Expr,
    scope: Scope,
    features: Features,
    source: Arc<str>,
    params: Box<[Arc<str>]>,
}

impl Script {
    pub fn new(
        body: Expr,
        scope: Scope,
        features: Features,
        source: Arc<str>,
        params: Box<[Arc<str>]>,
    ) -> Self {
        Script {
            body,
            scope,
            features,
            source,
            params,
        }
    }

    /// AST root.
    #[inline]
    pub fn body(&self) -> &Expr {
        &self.body
    }

    /// Symbol table for the script body.
    #[inline]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Feature set the script was parsed under.
    #[inline]
    pub fn features(&self) -> Features {
        self.features
    }

    /// Raw source text.
    #[inline]
    pub fn source(&self) -> &Arc<str> {
        &self.source
    }

    /// Declared parameter names, in slot order.
    #[inline]
    pub fn params(&self) -> &[Arc<str>] {
        &self.params
    }
}
