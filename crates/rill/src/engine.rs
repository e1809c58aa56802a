//! Public engine.
//!
//! An [`Engine`] bundles the pieces a host needs: a feature set and
//! strictness policy, an object model, a script cache, and optional
//! cooperative cancellation. Engines are cheap to share behind an `Arc`;
//! every evaluation gets its own frame, so one engine serves concurrent
//! callers.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use thiserror::Error;

use rill_eval::{
    Arithmetic, Context, EvalError, Evaluator, SharedModel, StandardModel, Value,
};
use rill_ir::{Features, Script};
use rill_parse::ParseError;

use crate::cache::{AuxCache, ScriptCache, SourceKey};
use crate::report::{self, LineIndex};

/// Anything a host-facing entry point can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Engine configuration.
pub struct EngineBuilder {
    features: Features,
    strict: bool,
    cache_capacity: usize,
    model: SharedModel,
    cancel: Option<Arc<AtomicBool>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        EngineBuilder {
            features: Features::default(),
            strict: false,
            cache_capacity: 256,
            model: Arc::new(StandardModel::new()),
            cancel: None,
        }
    }

    /// Language surface scripts compile under.
    #[must_use]
    pub fn features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    /// Strict policy: undefined variables and members, zero divisors,
    /// and failed coercions raise errors instead of resolving leniently.
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Script cache capacity; zero disables caching.
    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Replace the default object model.
    #[must_use]
    pub fn object_model(mut self, model: SharedModel) -> Self {
        self.model = model;
        self
    }

    /// Cooperative cancellation flag, checked at loop iterations and
    /// call boundaries of every evaluation this engine runs.
    #[must_use]
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            features: self.features,
            strict: self.strict,
            model: self.model,
            cancel: self.cancel,
            cache: ScriptCache::new(self.cache_capacity),
            lines: AuxCache::new(),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        EngineBuilder::new()
    }
}

/// Compiles, caches, and evaluates scripts.
pub struct Engine {
    features: Features,
    strict: bool,
    model: SharedModel,
    cancel: Option<Arc<AtomicBool>>,
    cache: ScriptCache,
    lines: AuxCache<Arc<LineIndex>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn new() -> Self {
        EngineBuilder::new().build()
    }

    /// Feature set this engine compiles under.
    pub fn features(&self) -> Features {
        self.features
    }

    /// Compile `source` with the named parameters, through the cache.
    pub fn compile(&self, source: &str, params: &[&str]) -> Result<Arc<Script>, ParseError> {
        let key = SourceKey::new(source, params, self.features);
        self.cache
            .get_or_compile(key, || rill_parse::parse(source, params, self.features))
    }

    /// Evaluate a compiled script against `ctx` with positional args.
    pub fn execute(
        &self,
        script: &Script,
        ctx: &mut dyn Context,
        args: Vec<Value>,
    ) -> Result<Value, EvalError> {
        let mut evaluator = Evaluator::new(Arithmetic::new(self.strict), ctx, self.model.as_ref());
        if let Some(flag) = self.cancel.as_deref() {
            evaluator = evaluator.with_cancel(flag);
        }
        evaluator.run(script, args)
    }

    /// Compile-and-evaluate convenience for parameterless sources.
    pub fn eval(&self, source: &str, ctx: &mut dyn Context) -> Result<Value, Error> {
        let script = self.compile(source, &[])?;
        Ok(self.execute(&script, ctx, Vec::new())?)
    }

    /// Render an uncaught evaluation error with source-line context.
    pub fn explain(&self, script: &Arc<Script>, err: &EvalError) -> String {
        let index = self
            .lines
            .get_or_insert_with(script, || Arc::new(LineIndex::new(script.source())));
        report::render(&index, script.source(), err.span, &err.to_string())
    }

    /// Render a parse error with source-line context.
    pub fn explain_parse(source: &str, err: &ParseError) -> String {
        let index = LineIndex::new(source);
        report::render(&index, source, Some(err.span), &err.to_string())
    }

    /// The script cache, for host-side size and clear control.
    pub fn cache(&self) -> &ScriptCache {
        &self.cache
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}
