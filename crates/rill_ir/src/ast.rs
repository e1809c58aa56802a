//! AST node model.
//!
//! One closed sum type per node category, carrying an operator-kind tag
//! where the category has several operators. Nodes are read-only after
//! parse except for the lazily populated, idempotently recomputable
//! [`AccessHint`] on member-access sites.
//!
//! Statements are value-producing expressions (a block yields its last
//! child's value, a loop its last iteration's), so a single `Expr` tree
//! covers both categories; control-flow signals are the evaluator's
//! concern.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::constant::Constant;
use crate::span::Span;
use crate::symbol::Scope;

/// Binary operator tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// Operator text, for error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unary operator tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        })
    }
}

/// Resolved identifier binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VarRef {
    /// Frame slot in the current scope.
    Local(usize),
    /// Free name, resolved through the host context at evaluation time.
    Global(Arc<str>),
}

/// Assignment target of a `foreach` loop variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopVar {
    Local(usize),
    Global(Arc<str>),
}

/// Lazily cached member-resolution hint on a call-site node.
///
/// Concurrent evaluations of one shared script may race on this cell;
/// writes are idempotent and type-stable for a given object-model
/// generation, so last-writer-wins is harmless. A hint recorded under a
/// different generation is ignored and overwritten.
#[derive(Debug, Default)]
pub struct AccessHint {
    entry: RwLock<Option<HintEntry>>,
}

/// Stored hint: object-model generation plus an evaluator-defined tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HintEntry {
    pub generation: u64,
    pub tag: u32,
}

impl AccessHint {
    pub fn new() -> Self {
        AccessHint::default()
    }

    /// Hint recorded under `generation`, if any.
    #[inline]
    pub fn load(&self, generation: u64) -> Option<u32> {
        let entry = *self.entry.read();
        entry.filter(|e| e.generation == generation).map(|e| e.tag)
    }

    /// Record a hint for `generation`, replacing any stale entry.
    #[inline]
    pub fn store(&self, generation: u64, tag: u32) {
        *self.entry.write() = Some(HintEntry { generation, tag });
    }

    /// Drop the cached hint.
    pub fn invalidate(&self) {
        *self.entry.write() = None;
    }
}

impl Clone for AccessHint {
    fn clone(&self) -> Self {
        AccessHint {
            entry: RwLock::new(*self.entry.read()),
        }
    }
}

/// Lambda body: its own scope plus the expression tree.
#[derive(Debug)]
pub struct Lambda {
    pub scope: Scope,
    pub body: Expr,
}

/// One `case`/`default` arm of a `switch`.
///
/// Execution starts at the first matching arm and falls through
/// subsequent arms until `break` or the end of the switch.
#[derive(Clone, Debug)]
pub struct SwitchCase {
    /// `None` marks the `default` arm.
    pub test: Option<Expr>,
    pub body: Vec<Expr>,
}

/// Expression/statement node kind.
#[derive(Clone, Debug)]
pub enum ExprKind {
    /// Pre-computed literal (scalar or folded composite).
    Literal(Constant),
    /// Array literal with at least one non-constant element.
    ArrayLit(Vec<Expr>),
    /// Map literal with at least one non-constant entry.
    MapLit(Vec<(Expr, Expr)>),
    /// Identifier carrying its resolved binding.
    Var(VarRef),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Short-circuit `&&`.
    And {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Short-circuit `||`.
    Or {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `cond ? then : other`; only the taken branch evaluates.
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        other: Box<Expr>,
    },
    /// `lhs ?? rhs`; `rhs` evaluates only when `lhs` is null.
    NullCoalesce {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Plain or compound assignment; `op` is the compound operator.
    Assign {
        target: Box<Expr>,
        op: Option<BinaryOp>,
        value: Box<Expr>,
    },
    /// `target.name` / `target?.name`.
    Property {
        target: Box<Expr>,
        name: Arc<str>,
        safe: bool,
        hint: Arc<AccessHint>,
    },
    /// `target[index]` / `target?[index]`.
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        safe: bool,
    },
    /// Call of a function-valued expression.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `target.name(args)` / `target?.name(args)` through the object model.
    MethodCall {
        target: Box<Expr>,
        name: Arc<str>,
        args: Vec<Expr>,
        safe: bool,
        hint: Arc<AccessHint>,
    },
    /// `new "class" (args)` through the object model.
    New {
        class: Arc<str>,
        args: Vec<Expr>,
    },
    Lambda(Arc<Lambda>),
    /// Statement sequence; yields the last child's value.
    Block(Vec<Expr>),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        other: Option<Box<Expr>>,
    },
    While {
        cond: Box<Expr>,
        body: Box<Expr>,
    },
    DoWhile {
        body: Box<Expr>,
        cond: Box<Expr>,
    },
    For {
        init: Option<Box<Expr>>,
        cond: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
        body: Box<Expr>,
    },
    ForEach {
        var: LoopVar,
        iterable: Box<Expr>,
        body: Box<Expr>,
    },
    Break,
    Continue,
    Return(Option<Box<Expr>>),
    Throw(Box<Expr>),
    Try {
        body: Box<Expr>,
        /// Frame slot the caught value binds to.
        catch_var: Option<usize>,
        catch: Option<Box<Expr>>,
        finally: Option<Box<Expr>>,
    },
    Switch {
        subject: Box<Expr>,
        cases: Vec<SwitchCase>,
    },
    /// `var`/`let`/`const` declaration; slot and const-ness are resolved
    /// at parse time, so only the slot survives here.
    Decl {
        slot: usize,
        init: Option<Box<Expr>>,
    },
}

/// AST node: kind plus source position.
#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    /// Source position of this node.
    #[inline]
    pub fn position(&self) -> Span {
        self.span
    }

    /// Whether this node is a pre-computed constant.
    #[inline]
    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            ExprKind::Literal(c) => Some(c),
            _ => None,
        }
    }

    /// Direct children, in evaluation order where one exists.
    pub fn children(&self) -> SmallVec<[&Expr; 4]> {
        let mut out = SmallVec::new();
        self.push_children(&mut out);
        out
    }

    fn push_children<'a>(&'a self, out: &mut SmallVec<[&'a Expr; 4]>) {
        match &self.kind {
            ExprKind::Literal(_)
            | ExprKind::Var(_)
            | ExprKind::Break
            | ExprKind::Continue => {}
            ExprKind::ArrayLit(items) => out.extend(items.iter()),
            ExprKind::MapLit(entries) => {
                for (k, v) in entries {
                    out.push(k);
                    out.push(v);
                }
            }
            ExprKind::Unary { operand, .. } => out.push(operand),
            ExprKind::Binary { lhs, rhs, .. }
            | ExprKind::And { lhs, rhs }
            | ExprKind::Or { lhs, rhs }
            | ExprKind::NullCoalesce { lhs, rhs } => {
                out.push(lhs);
                out.push(rhs);
            }
            ExprKind::Ternary { cond, then, other } => {
                out.push(cond);
                out.push(then);
                out.push(other);
            }
            ExprKind::Assign { target, value, .. } => {
                out.push(value);
                out.push(target);
            }
            ExprKind::Property { target, .. } => out.push(target),
            ExprKind::Index { target, index, .. } => {
                out.push(target);
                out.push(index);
            }
            ExprKind::Call { callee, args } => {
                out.push(callee);
                out.extend(args.iter());
            }
            ExprKind::MethodCall { target, args, .. } => {
                out.push(target);
                out.extend(args.iter());
            }
            ExprKind::New { args, .. } => out.extend(args.iter()),
            ExprKind::Lambda(lambda) => out.push(&lambda.body),
            ExprKind::Block(stmts) => out.extend(stmts.iter()),
            ExprKind::If { cond, then, other } => {
                out.push(cond);
                out.push(then);
                if let Some(other) = other {
                    out.push(other);
                }
            }
            ExprKind::While { cond, body } => {
                out.push(cond);
                out.push(body);
            }
            ExprKind::DoWhile { body, cond } => {
                out.push(body);
                out.push(cond);
            }
            ExprKind::For {
                init,
                cond,
                step,
                body,
            } => {
                out.extend(init.iter().map(AsRef::as_ref));
                out.extend(cond.iter().map(AsRef::as_ref));
                out.extend(step.iter().map(AsRef::as_ref));
                out.push(body);
            }
            ExprKind::ForEach { iterable, body, .. } => {
                out.push(iterable);
                out.push(body);
            }
            ExprKind::Return(value) => out.extend(value.iter().map(AsRef::as_ref)),
            ExprKind::Throw(value) => out.push(value),
            ExprKind::Try {
                body,
                catch,
                finally,
                ..
            } => {
                out.push(body);
                out.extend(catch.iter().map(AsRef::as_ref));
                out.extend(finally.iter().map(AsRef::as_ref));
            }
            ExprKind::Switch { subject, cases } => {
                out.push(subject);
                for case in cases {
                    out.extend(case.test.iter());
                    out.extend(case.body.iter());
                }
            }
            ExprKind::Decl { init, .. } => out.extend(init.iter().map(AsRef::as_ref)),
        }
    }
}

/// Read-only AST visitor, for validation and debugging tooling.
///
/// Not used on the evaluation hot path; the evaluator dispatches on
/// `ExprKind` directly.
pub trait Visitor {
    /// Called for each node in pre-order. Return `false` to skip the
    /// node's subtree.
    fn visit(&mut self, expr: &Expr) -> bool;
}

/// Pre-order walk of `expr`, driving `visitor`.
pub fn walk_expr(visitor: &mut dyn Visitor, expr: &Expr) {
    if !visitor.visit(expr) {
        return;
    }
    for child in expr.children() {
        walk_expr(visitor, child);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    struct Counter(usize);

    impl Visitor for Counter {
        fn visit(&mut self, _expr: &Expr) -> bool {
            self.0 += 1;
            true
        }
    }

    fn lit(v: i64) -> Expr {
        Expr::new(ExprKind::Literal(Constant::Int(v)), Span::DUMMY)
    }

    #[test]
    fn walk_visits_every_node() {
        let expr = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(lit(1)),
                rhs: Box::new(Expr::new(
                    ExprKind::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(lit(2)),
                    },
                    Span::DUMMY,
                )),
            },
            Span::DUMMY,
        );
        let mut counter = Counter(0);
        walk_expr(&mut counter, &expr);
        assert_eq!(counter.0, 4);
    }

    #[test]
    fn access_hint_ignores_stale_generation() {
        let hint = AccessHint::new();
        hint.store(1, 7);
        assert_eq!(hint.load(1), Some(7));
        assert_eq!(hint.load(2), None);
        hint.store(2, 9);
        assert_eq!(hint.load(2), Some(9));
        hint.invalidate();
        assert_eq!(hint.load(2), None);
    }
}
