//! Tree-walking evaluator.
//!
//! Expression nodes produce values; statement nodes produce values or
//! unwind signals ([`crate::control::Unwind`]), propagated with `?`.
//! Helper impls live in sibling modules:
//!
//! - `access` - member chains, safe navigation, calls, assignment targets
//! - `flow` - loops, switch, try/catch/finally
//!
//! One evaluator borrows the host context and object model for the
//! duration of a single evaluation; a shared script plus one frame per
//! evaluation is the concurrency unit.

mod access;
mod flow;

use std::sync::atomic::{AtomicBool, Ordering};

use rill_ir::{Constant, Expr, ExprKind, Features, Scope, Script, Span, UnaryOp, VarRef};

use crate::arith::Arithmetic;
use crate::context::Context;
use crate::control::{Eval, Unwind};
use crate::error::{cancelled, internal, undefined_variable, unbound_local, EvalError};
use crate::frame::Frame;
use crate::object::ObjectModel;
use crate::stack::with_sufficient_stack;
use crate::value::Value;

/// A frame paired with the scope it was built from.
pub(crate) struct Activation<'s> {
    pub(crate) scope: &'s Scope,
    pub(crate) frame: Frame,
}

/// One evaluation pass over a script.
pub struct Evaluator<'a> {
    arith: Arithmetic,
    ctx: &'a mut dyn Context,
    model: &'a dyn ObjectModel,
    cancel: Option<&'a AtomicBool>,
    strict_shade: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(arith: Arithmetic, ctx: &'a mut dyn Context, model: &'a dyn ObjectModel) -> Self {
        Evaluator {
            arith,
            ctx,
            model,
            cancel: None,
            strict_shade: false,
        }
    }

    /// Attach a cooperative cancellation flag, checked at loop iterations
    /// and call boundaries.
    #[must_use]
    pub fn with_cancel(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Evaluate a script with positional arguments bound to its declared
    /// parameters.
    pub fn run(&mut self, script: &Script, args: Vec<Value>) -> Result<Value, EvalError> {
        self.strict_shade = script.features().contains(Features::LEXICAL_SHADE);
        let mut act = Activation {
            scope: script.scope(),
            frame: Frame::new(script.scope(), &[], args),
        };
        tracing::trace!(source = %script.source(), "evaluating script");
        match self.eval(&mut act, script.body()) {
            Ok(v) | Err(Unwind::Return(v)) => Ok(v),
            Err(Unwind::Thrown(err)) => Err(err),
            Err(Unwind::Break(span) | Unwind::Continue(span)) => {
                Err(internal("loop signal escaped the script body").with_span(span))
            }
            Err(Unwind::Cancelled) => Err(cancelled()),
        }
    }

    #[inline]
    pub(crate) fn arith(&self) -> Arithmetic {
        self.arith
    }

    #[inline]
    pub(crate) fn strict(&self) -> bool {
        self.arith.is_strict()
    }

    pub(crate) fn check_cancel(&self) -> Result<(), Unwind> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Unwind::Cancelled),
            _ => Ok(()),
        }
    }

    /// Evaluate one node, growing the native stack when needed.
    pub(crate) fn eval(&mut self, act: &mut Activation<'_>, e: &Expr) -> Eval {
        with_sufficient_stack(|| self.eval_inner(act, e))
    }

    fn eval_inner(&mut self, act: &mut Activation<'_>, e: &Expr) -> Eval {
        let span = e.span;
        match &e.kind {
            ExprKind::Literal(c) => Ok(Value::from(c)),
            ExprKind::ArrayLit(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(act, item)?);
                }
                Ok(Value::list(out))
            }
            ExprKind::MapLit(entries) => {
                let mut map = rustc_hash::FxHashMap::default();
                for (k, v) in entries {
                    let key = self.eval(act, k)?;
                    let value = self.eval(act, v)?;
                    map.insert(key.to_string(), value);
                }
                Ok(Value::map(map))
            }
            ExprKind::Var(var) => self.read_var(act, var, span),
            ExprKind::Unary { op, operand } => {
                let v = self.eval(act, operand)?;
                match op {
                    UnaryOp::Neg => self
                        .arith
                        .negate(&v)
                        .map_err(|err| Unwind::Thrown(err.with_span(span))),
                    UnaryOp::Not => Ok(Value::Bool(!self.arith.to_boolean(&v))),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.eval(act, lhs)?;
                let r = self.eval(act, rhs)?;
                self.arith
                    .binary(*op, &l, &r)
                    .map_err(|err| Unwind::Thrown(err.with_span(span)))
            }
            ExprKind::And { lhs, rhs } => {
                let l = self.eval(act, lhs)?;
                if !self.arith.to_boolean(&l) {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval(act, rhs)?;
                Ok(Value::Bool(self.arith.to_boolean(&r)))
            }
            ExprKind::Or { lhs, rhs } => {
                let l = self.eval(act, lhs)?;
                if self.arith.to_boolean(&l) {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval(act, rhs)?;
                Ok(Value::Bool(self.arith.to_boolean(&r)))
            }
            ExprKind::Ternary { cond, then, other } => {
                let c = self.eval(act, cond)?;
                if self.arith.to_boolean(&c) {
                    self.eval(act, then)
                } else {
                    self.eval(act, other)
                }
            }
            ExprKind::NullCoalesce { lhs, rhs } => {
                let l = self.eval(act, lhs)?;
                if l.is_null() {
                    self.eval(act, rhs)
                } else {
                    Ok(l)
                }
            }
            ExprKind::Assign { target, op, value } => self.assign(act, target, *op, value, span),
            ExprKind::Property { .. }
            | ExprKind::Index { .. }
            | ExprKind::MethodCall { .. } => self.eval_chain_root(act, e),
            ExprKind::Call { callee, args } => self.eval_call(act, callee, args, span),
            ExprKind::New { class, args } => self.eval_new(act, class, args, span),
            ExprKind::Lambda(lambda) => Ok(self.make_closure(act, lambda)),
            ExprKind::Block(stmts) => {
                let mut result = Value::Null;
                for stmt in stmts {
                    result = self.eval(act, stmt)?;
                }
                Ok(result)
            }
            ExprKind::If { cond, then, other } => {
                let c = self.eval(act, cond)?;
                if self.arith.to_boolean(&c) {
                    self.eval(act, then)
                } else if let Some(other) = other {
                    self.eval(act, other)
                } else {
                    Ok(Value::Null)
                }
            }
            ExprKind::While { cond, body } => self.eval_while(act, cond, body),
            ExprKind::DoWhile { body, cond } => self.eval_do_while(act, body, cond),
            ExprKind::For {
                init,
                cond,
                step,
                body,
            } => self.eval_for(act, init.as_deref(), cond.as_deref(), step.as_deref(), body),
            ExprKind::ForEach {
                var,
                iterable,
                body,
            } => self.eval_foreach(act, var, iterable, body, span),
            ExprKind::Break => Err(Unwind::Break(span)),
            ExprKind::Continue => Err(Unwind::Continue(span)),
            ExprKind::Return(value) => {
                let v = match value {
                    Some(value) => self.eval(act, value)?,
                    None => Value::Null,
                };
                Err(Unwind::Return(v))
            }
            ExprKind::Throw(value) => {
                let v = self.eval(act, value)?;
                Err(Unwind::Thrown(
                    crate::error::user_thrown(v).with_span(span),
                ))
            }
            ExprKind::Try {
                body,
                catch_var,
                catch,
                finally,
            } => self.eval_try(act, body, *catch_var, catch.as_deref(), finally.as_deref()),
            ExprKind::Switch { subject, cases } => self.eval_switch(act, subject, cases),
            ExprKind::Decl { slot, init } => {
                let v = match init {
                    Some(init) => self.eval(act, init)?,
                    None => Value::Null,
                };
                act.frame.set(*slot, v.clone());
                Ok(v)
            }
        }
    }

    /// Read an identifier: frame slot, falling through to the context for
    /// unbound locals (unless strict shading) and free names.
    fn read_var(&mut self, act: &mut Activation<'_>, var: &VarRef, span: Span) -> Eval {
        match var {
            VarRef::Local(slot) => {
                if let Some(v) = act.frame.get(*slot) {
                    return Ok(v);
                }
                // Declaration has not executed. Shaded lexical symbols may
                // not fall through under strict shading.
                let Some(symbol) = act.scope.symbol(*slot) else {
                    return Err(internal("slot out of range").with_span(span).into());
                };
                if self.strict_shade && symbol.is_lexical() {
                    return Err(unbound_local(symbol.name()).with_span(span).into());
                }
                self.read_global(symbol.name(), span)
            }
            VarRef::Global(name) => self.read_global(name, span),
        }
    }

    fn read_global(&mut self, name: &str, span: Span) -> Eval {
        if let Some(v) = self.ctx.get(name) {
            return Ok(v);
        }
        if self.strict() {
            Err(undefined_variable(name).with_span(span).into())
        } else {
            Ok(Value::Null)
        }
    }

    /// Constant-fold helper for hosts: a node is constant if it is a
    /// pre-computed literal.
    pub fn constant_of(e: &Expr) -> Option<&Constant> {
        e.as_constant()
    }
}
