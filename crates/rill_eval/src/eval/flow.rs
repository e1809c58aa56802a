//! Loops, switch, and try/catch/finally.
//!
//! Loop nodes intercept `Break` (stop, yield the last completed
//! iteration's value) and `Continue` (advance); `Return`, `Thrown`, and
//! `Cancelled` pass through unchanged. `finally` runs on every exit path,
//! and a non-normal signal produced inside `finally` overrides whatever
//! signal was propagating.

use rill_ir::{Expr, LoopVar, Span, SwitchCase};

use crate::control::{Eval, Unwind};
use crate::error::not_iterable;
use crate::value::Value;

use super::{Activation, Evaluator};

/// Outcome of one loop body run.
enum Iteration {
    Ran(Value),
    Continued,
    Broke,
}

impl Evaluator<'_> {
    /// Run a loop body once, folding `Break`/`Continue` into a normal
    /// outcome and letting everything else unwind.
    fn iterate(&mut self, act: &mut Activation<'_>, body: &Expr) -> Result<Iteration, Unwind> {
        match self.eval(act, body) {
            Ok(v) => Ok(Iteration::Ran(v)),
            Err(Unwind::Continue(_)) => Ok(Iteration::Continued),
            Err(Unwind::Break(_)) => Ok(Iteration::Broke),
            Err(other) => Err(other),
        }
    }

    pub(super) fn eval_while(
        &mut self,
        act: &mut Activation<'_>,
        cond: &Expr,
        body: &Expr,
    ) -> Eval {
        let mut result = Value::Null;
        loop {
            self.check_cancel()?;
            let c = self.eval(act, cond)?;
            if !self.arith().to_boolean(&c) {
                break;
            }
            match self.iterate(act, body)? {
                Iteration::Ran(v) => result = v,
                Iteration::Continued => {}
                Iteration::Broke => break,
            }
        }
        Ok(result)
    }

    pub(super) fn eval_do_while(
        &mut self,
        act: &mut Activation<'_>,
        body: &Expr,
        cond: &Expr,
    ) -> Eval {
        let mut result = Value::Null;
        loop {
            self.check_cancel()?;
            match self.iterate(act, body)? {
                Iteration::Ran(v) => result = v,
                Iteration::Continued => {}
                Iteration::Broke => break,
            }
            let c = self.eval(act, cond)?;
            if !self.arith().to_boolean(&c) {
                break;
            }
        }
        Ok(result)
    }

    pub(super) fn eval_for(
        &mut self,
        act: &mut Activation<'_>,
        init: Option<&Expr>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Expr,
    ) -> Eval {
        if let Some(init) = init {
            self.eval(act, init)?;
        }
        let mut result = Value::Null;
        loop {
            self.check_cancel()?;
            if let Some(cond) = cond {
                let c = self.eval(act, cond)?;
                if !self.arith().to_boolean(&c) {
                    break;
                }
            }
            // `continue` still runs the step expression.
            match self.iterate(act, body)? {
                Iteration::Ran(v) => result = v,
                Iteration::Continued => {}
                Iteration::Broke => break,
            }
            if let Some(step) = step {
                self.eval(act, step)?;
            }
        }
        Ok(result)
    }

    pub(super) fn eval_foreach(
        &mut self,
        act: &mut Activation<'_>,
        var: &LoopVar,
        iterable: &Expr,
        body: &Expr,
        span: Span,
    ) -> Eval {
        let subject = self.eval(act, iterable)?;
        let items = match &subject {
            // Snapshot: body mutations of the list do not move the cursor.
            Value::List(items) => items.read().clone(),
            Value::Map(entries) => {
                let map = entries.read();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort_unstable();
                keys.into_iter().map(|k| map[k].clone()).collect()
            }
            Value::Str(s) => s.chars().map(|c| Value::string(c.to_string())).collect(),
            Value::Null => Vec::new(),
            other => {
                if self.strict() {
                    return Err(not_iterable(other).with_span(span).into());
                }
                Vec::new()
            }
        };
        let mut result = Value::Null;
        for item in items {
            self.check_cancel()?;
            match var {
                LoopVar::Local(slot) => act.frame.set(*slot, item),
                LoopVar::Global(name) => self.ctx.set(name, item),
            }
            match self.iterate(act, body)? {
                Iteration::Ran(v) => result = v,
                Iteration::Continued => {}
                Iteration::Broke => break,
            }
        }
        Ok(result)
    }

    /// Fallthrough switch: execution starts at the first matching arm
    /// (or the `default` arm) and runs until `break` or the end.
    pub(super) fn eval_switch(
        &mut self,
        act: &mut Activation<'_>,
        subject: &Expr,
        cases: &[SwitchCase],
    ) -> Eval {
        let subject = self.eval(act, subject)?;
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let test = self.eval(act, test)?;
                if self.arith().equals(&test, &subject) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = match start.or_else(|| cases.iter().position(|c| c.test.is_none())) {
            Some(i) => i,
            None => return Ok(Value::Null),
        };
        let mut result = Value::Null;
        for case in &cases[start..] {
            for stmt in &case.body {
                match self.eval(act, stmt) {
                    Ok(v) => result = v,
                    Err(Unwind::Break(_)) => return Ok(result),
                    Err(other) => return Err(other),
                }
            }
        }
        Ok(result)
    }

    /// `try/catch/finally`. The catch clause intercepts `Thrown` only;
    /// `finally` executes on every exit path and its own non-normal
    /// signal replaces the one that was propagating.
    pub(super) fn eval_try(
        &mut self,
        act: &mut Activation<'_>,
        body: &Expr,
        catch_var: Option<usize>,
        catch: Option<&Expr>,
        finally: Option<&Expr>,
    ) -> Eval {
        let mut outcome = self.eval(act, body);
        if let Some(catch) = catch {
            let thrown = match &outcome {
                Err(Unwind::Thrown(err)) => Some(err.to_value()),
                _ => None,
            };
            if let Some(value) = thrown {
                if let Some(slot) = catch_var {
                    act.frame.set(slot, value);
                }
                outcome = self.eval(act, catch);
            }
        }
        if let Some(finally) = finally {
            match self.eval(act, finally) {
                Ok(_) => {}
                non_normal => return non_normal,
            }
        }
        outcome
    }
}
