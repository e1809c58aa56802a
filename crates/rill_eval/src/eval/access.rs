//! Member chains, calls, and assignment targets.
//!
//! Postfix chains (`a.b[c].d(e)`) evaluate left to right. A safe link
//! (`?.` / `?[`) meeting null short-circuits the *entire* remaining
//! chain to null: once shorted, no later link evaluates its key or
//! arguments, so their side effects never occur.

use std::sync::Arc;

use rill_ir::{AccessHint, BinaryOp, Expr, ExprKind, Lambda, Span, VarRef};

use crate::control::{Eval, Unwind};
use crate::error::{
    arity_mismatch, internal, invalid_assign_target, no_such_member, not_callable,
};
use crate::object::Lookup;
use crate::value::{Closure, Value};

use super::{Activation, Evaluator};

/// Chain evaluation state: a value, or "a safe link already met null".
enum Chained {
    Value(Value),
    Shorted,
}

/// Receiver-shape tag recorded in access hints. Idempotent and
/// type-stable for a given object-model generation.
fn shape_tag(v: &Value) -> u32 {
    match v {
        Value::Map(_) => 1,
        Value::List(_) => 2,
        Value::Str(_) => 3,
        _ => 0,
    }
}

impl Evaluator<'_> {
    /// Entry point for a chain node appearing as an ordinary expression.
    pub(super) fn eval_chain_root(&mut self, act: &mut Activation<'_>, e: &Expr) -> Eval {
        match self.eval_chain(act, e)? {
            Chained::Value(v) => Ok(v),
            Chained::Shorted => Ok(Value::Null),
        }
    }

    fn eval_chain(&mut self, act: &mut Activation<'_>, e: &Expr) -> Result<Chained, Unwind> {
        let span = e.span;
        match &e.kind {
            ExprKind::Property {
                target,
                name,
                safe,
                hint,
            } => {
                let obj = match self.eval_chain(act, target)? {
                    Chained::Shorted => return Ok(Chained::Shorted),
                    Chained::Value(v) => v,
                };
                if obj.is_null() {
                    return self.null_link(*safe, name, span);
                }
                let key = Value::Str(Arc::clone(name));
                self.get_member(&obj, &key, Some(hint), span).map(Chained::Value)
            }
            ExprKind::Index {
                target,
                index,
                safe,
            } => {
                let obj = match self.eval_chain(act, target)? {
                    Chained::Shorted => return Ok(Chained::Shorted),
                    Chained::Value(v) => v,
                };
                if obj.is_null() {
                    return self.null_link(*safe, "[]", span);
                }
                let key = self.eval(act, index)?;
                self.get_member(&obj, &key, None, span).map(Chained::Value)
            }
            ExprKind::MethodCall {
                target,
                name,
                args,
                safe,
                hint,
            } => {
                let obj = match self.eval_chain(act, target)? {
                    Chained::Shorted => return Ok(Chained::Shorted),
                    Chained::Value(v) => v,
                };
                if obj.is_null() {
                    return self.null_link(*safe, name, span);
                }
                self.check_cancel()?;
                let mut argv = Vec::with_capacity(args.len());
                for arg in args {
                    argv.push(self.eval(act, arg)?);
                }
                self.invoke_member(&obj, name, argv, hint, span)
                    .map(Chained::Value)
            }
            _ => self.eval(act, e).map(Chained::Value),
        }
    }

    /// A chain link whose receiver is null: shorted when safe, otherwise
    /// a policy decision.
    fn null_link(&self, safe: bool, name: &str, span: Span) -> Result<Chained, Unwind> {
        if safe {
            return Ok(Chained::Shorted);
        }
        if self.strict() {
            Err(no_such_member(&Value::Null, name).with_span(span).into())
        } else {
            Ok(Chained::Value(Value::Null))
        }
    }

    /// Member read through the object model, maintaining the node hint.
    fn get_member(
        &mut self,
        obj: &Value,
        key: &Value,
        hint: Option<&AccessHint>,
        span: Span,
    ) -> Result<Value, Unwind> {
        let generation = self.model.generation();
        if let Some(hint) = hint {
            if hint.load(generation).is_none() {
                hint.store(generation, shape_tag(obj));
            }
        }
        match self.model.get_member(obj, key) {
            Ok(Lookup::Found(v)) => Ok(v),
            Ok(Lookup::Missing) => {
                if self.strict() {
                    Err(no_such_member(obj, &key.to_string()).with_span(span).into())
                } else {
                    Ok(Value::Null)
                }
            }
            Err(err) => Err(err.with_span(span).into()),
        }
    }

    /// Method invocation, falling back to a closure-valued member so map
    /// values carrying lambdas behave like objects.
    fn invoke_member(
        &mut self,
        obj: &Value,
        name: &str,
        args: Vec<Value>,
        hint: &AccessHint,
        span: Span,
    ) -> Result<Value, Unwind> {
        let generation = self.model.generation();
        if hint.load(generation).is_none() {
            hint.store(generation, shape_tag(obj));
        }
        match self.model.invoke(obj, name, &args) {
            Ok(Lookup::Found(v)) => Ok(v),
            Ok(Lookup::Missing) => {
                let key = Value::string(name.to_owned());
                if let Ok(Lookup::Found(Value::Closure(c))) = self.model.get_member(obj, &key) {
                    return self.call_closure(&c, args, span);
                }
                if self.strict() {
                    Err(no_such_member(obj, name).with_span(span).into())
                } else {
                    Ok(Value::Null)
                }
            }
            Err(err) => Err(err.with_span(span).into()),
        }
    }

    pub(super) fn eval_call(
        &mut self,
        act: &mut Activation<'_>,
        callee: &Expr,
        args: &[Expr],
        span: Span,
    ) -> Eval {
        let f = self.eval(act, callee)?;
        let mut argv = Vec::with_capacity(args.len());
        for arg in args {
            argv.push(self.eval(act, arg)?);
        }
        match f {
            Value::Closure(c) => self.call_closure(&c, argv, span),
            other if self.strict() => Err(not_callable(&other).with_span(span).into()),
            _ => Ok(Value::Null),
        }
    }

    pub(super) fn eval_new(
        &mut self,
        act: &mut Activation<'_>,
        class: &str,
        args: &[Expr],
        span: Span,
    ) -> Eval {
        let mut argv = Vec::with_capacity(args.len());
        for arg in args {
            argv.push(self.eval(act, arg)?);
        }
        match self.model.construct(class, &argv) {
            Ok(Lookup::Found(v)) => Ok(v),
            Ok(Lookup::Missing) => {
                if self.strict() {
                    Err(no_such_member(&Value::Null, class).with_span(span).into())
                } else {
                    Ok(Value::Null)
                }
            }
            Err(err) => Err(err.with_span(span).into()),
        }
    }

    /// Build a closure: link the lambda scope's capture list to this
    /// frame's cells by reference.
    pub(super) fn make_closure(&mut self, act: &mut Activation<'_>, lambda: &Arc<Lambda>) -> Value {
        let cells = lambda
            .scope
            .captures()
            .iter()
            .map(|c| act.frame.cell(c.outer_slot))
            .collect();
        Value::Closure(Arc::new(Closure {
            lambda: Arc::clone(lambda),
            cells,
        }))
    }

    /// Invoke a closure with its own frame. `return` unwinds to here;
    /// thrown errors and cancellation pass through.
    pub(crate) fn call_closure(
        &mut self,
        closure: &Closure,
        args: Vec<Value>,
        span: Span,
    ) -> Result<Value, Unwind> {
        self.check_cancel()?;
        let scope = &closure.lambda.scope;
        if args.len() != scope.param_count() {
            return Err(arity_mismatch(scope.param_count(), args.len())
                .with_span(span)
                .into());
        }
        let mut act = Activation {
            scope,
            frame: crate::frame::Frame::new(scope, &closure.cells, args),
        };
        match self.eval(&mut act, &closure.lambda.body) {
            Ok(v) | Err(Unwind::Return(v)) => Ok(v),
            Err(Unwind::Break(s) | Unwind::Continue(s)) => {
                Err(internal("loop signal escaped a function body").with_span(s).into())
            }
            Err(other) => Err(other),
        }
    }

    /// Assignment. The right-hand side evaluates first; then the target
    /// location resolves exactly once (object and key each evaluated a
    /// single time), reads once for compound forms, and writes once.
    pub(super) fn assign(
        &mut self,
        act: &mut Activation<'_>,
        target: &Expr,
        op: Option<BinaryOp>,
        value: &Expr,
        span: Span,
    ) -> Eval {
        let rhs = self.eval(act, value)?;
        match &target.kind {
            ExprKind::Var(VarRef::Local(slot)) => {
                let stored = match op {
                    Some(op) => {
                        let current = self.read_var_for_compound(act, target)?;
                        self.combine(op, &current, &rhs, span)?
                    }
                    None => rhs,
                };
                act.frame.set(*slot, stored.clone());
                Ok(stored)
            }
            ExprKind::Var(VarRef::Global(name)) => {
                let stored = match op {
                    Some(op) => {
                        let current = self.ctx.get(name).unwrap_or(Value::Null);
                        self.combine(op, &current, &rhs, span)?
                    }
                    None => rhs,
                };
                self.ctx.set(name, stored.clone());
                Ok(stored)
            }
            ExprKind::Property {
                target: obj_expr,
                name,
                safe,
                hint,
            } => {
                let obj = match self.eval_chain(act, obj_expr)? {
                    Chained::Shorted => return Ok(Value::Null),
                    Chained::Value(v) => v,
                };
                if obj.is_null() {
                    return match self.null_link(*safe, name, span)? {
                        Chained::Shorted | Chained::Value(_) => Ok(Value::Null),
                    };
                }
                let key = Value::Str(Arc::clone(name));
                self.write_member(&obj, &key, op, rhs, Some(hint), span)
            }
            ExprKind::Index {
                target: obj_expr,
                index,
                safe,
            } => {
                let obj = match self.eval_chain(act, obj_expr)? {
                    Chained::Shorted => return Ok(Value::Null),
                    Chained::Value(v) => v,
                };
                if obj.is_null() {
                    return match self.null_link(*safe, "[]", span)? {
                        Chained::Shorted | Chained::Value(_) => Ok(Value::Null),
                    };
                }
                let key = self.eval(act, index)?;
                self.write_member(&obj, &key, op, rhs, None, span)
            }
            _ => Err(invalid_assign_target().with_span(span).into()),
        }
    }

    /// Current value of a local target for compound assignment; unbound
    /// and undefined resolve leniently to null even under strict mode,
    /// since the write is about to define the variable.
    fn read_var_for_compound(&mut self, act: &mut Activation<'_>, target: &Expr) -> Result<Value, Unwind> {
        if let ExprKind::Var(VarRef::Local(slot)) = &target.kind {
            if let Some(v) = act.frame.get(*slot) {
                return Ok(v);
            }
            if let Some(symbol) = act.scope.symbol(*slot) {
                if let Some(v) = self.ctx.get(symbol.name()) {
                    return Ok(v);
                }
            }
        }
        Ok(Value::Null)
    }

    fn combine(
        &mut self,
        op: BinaryOp,
        current: &Value,
        rhs: &Value,
        span: Span,
    ) -> Result<Value, Unwind> {
        self.arith()
            .binary(op, current, rhs)
            .map_err(|err| err.with_span(span).into())
    }

    /// One write at the final chain step, compound forms reading through
    /// the same resolved location first.
    fn write_member(
        &mut self,
        obj: &Value,
        key: &Value,
        op: Option<BinaryOp>,
        rhs: Value,
        hint: Option<&AccessHint>,
        span: Span,
    ) -> Eval {
        let stored = match op {
            Some(op) => {
                let current = self.get_member(obj, key, hint, span)?;
                self.combine(op, &current, &rhs, span)?
            }
            None => rhs,
        };
        match self.model.set_member(obj, key, stored.clone()) {
            Ok(Lookup::Found(_)) => Ok(stored),
            Ok(Lookup::Missing) => {
                if self.strict() {
                    Err(no_such_member(obj, &key.to_string()).with_span(span).into())
                } else {
                    Ok(Value::Null)
                }
            }
            Err(err) => Err(err.with_span(span).into()),
        }
    }
}
