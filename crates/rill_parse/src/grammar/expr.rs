//! Expression precedence ladder.
//!
//! Lowest to highest: assignment, ternary, `??`, `||`, `&&`, equality,
//! relational, additive, multiplicative, unary, postfix, primary.
//! Literal subtrees fold to constants as they close.

use std::sync::Arc;

use rill_ir::{AccessHint, BinaryOp, Constant, Expr, ExprKind, Features, UnaryOp, VarRef};

use crate::error::ParseError;
use crate::lexer::TokenKind;

use super::Parser;

impl Parser {
    pub(crate) fn expression(&mut self) -> Result<Expr, ParseError> {
        self.assignment()
    }

    /// Right-associative plain and compound assignment.
    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let target = self.ternary()?;
        let op = match self.cursor.kind() {
            TokenKind::Eq => None,
            TokenKind::PlusEq => Some(BinaryOp::Add),
            TokenKind::MinusEq => Some(BinaryOp::Sub),
            TokenKind::StarEq => Some(BinaryOp::Mul),
            TokenKind::SlashEq => Some(BinaryOp::Div),
            TokenKind::PercentEq => Some(BinaryOp::Mod),
            _ => return Ok(target),
        };
        let op_span = self.cursor.span();
        self.cursor.advance();
        self.check_assign_target(&target, op_span)?;
        let value = self.assignment()?;
        let span = target.span.merge(value.span);
        Ok(Expr::new(
            ExprKind::Assign {
                target: Box::new(target),
                op,
                value: Box::new(value),
            },
            span,
        ))
    }

    fn ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.coalesce()?;
        if !self.cursor.eat(&TokenKind::Question) {
            return Ok(cond);
        }
        let then = self.expression()?;
        self.cursor.expect(&TokenKind::Colon, "':'")?;
        let other = self.ternary()?;
        let span = cond.span.merge(other.span);
        Ok(Expr::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                other: Box::new(other),
            },
            span,
        ))
    }

    fn coalesce(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.logical_or()?;
        while self.cursor.eat(&TokenKind::QuestionQuestion) {
            let rhs = self.logical_or()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::NullCoalesce {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn logical_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.logical_and()?;
        while self.cursor.eat(&TokenKind::OrOr) {
            let rhs = self.logical_and()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::Or {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn logical_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.equality()?;
        while self.cursor.eat(&TokenKind::AndAnd) {
            let rhs = self.equality()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(
                ExprKind::And {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.relational()?;
        loop {
            let op = match self.cursor.kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::Ne,
                _ => return Ok(lhs),
            };
            self.cursor.advance();
            let rhs = self.relational()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn relational(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.additive()?;
        loop {
            let op = match self.cursor.kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::LtEq => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::GtEq => BinaryOp::Ge,
                _ => return Ok(lhs),
            };
            self.cursor.advance();
            let rhs = self.additive()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.cursor.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.cursor.advance();
            let rhs = self.multiplicative()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.cursor.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.cursor.advance();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.cursor.kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        let start = self.cursor.span();
        self.cursor.advance();
        let operand = self.unary()?;
        let span = start.merge(operand.span);
        // Fold negation of a numeric literal so `-1` is one constant.
        if op == UnaryOp::Neg {
            match operand.as_constant() {
                Some(Constant::Int(v)) => {
                    if let Some(neg) = v.checked_neg() {
                        return Ok(Expr::new(ExprKind::Literal(Constant::Int(neg)), span));
                    }
                }
                Some(Constant::Float(v)) => {
                    return Ok(Expr::new(ExprKind::Literal(Constant::Float(-v)), span));
                }
                _ => {}
            }
        }
        if op == UnaryOp::Not {
            if let Some(Constant::Bool(v)) = operand.as_constant() {
                return Ok(Expr::new(ExprKind::Literal(Constant::Bool(!v)), span));
            }
        }
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    /// Postfix chains: `.name`, `?.name`, `[i]`, `?[i]`, and call
    /// parentheses, left to right.
    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            match self.cursor.kind() {
                TokenKind::Dot | TokenKind::QuestionDot => {
                    let safe = matches!(self.cursor.kind(), TokenKind::QuestionDot);
                    self.cursor.advance();
                    let (name, name_span) = self.cursor.expect_ident("member name")?;
                    if self.cursor.at(&TokenKind::LParen) {
                        self.require(Features::METHOD_CALLS, "method calls")?;
                        let args = self.call_args()?;
                        let span = expr.span.merge(self.cursor.span());
                        expr = Expr::new(
                            ExprKind::MethodCall {
                                target: Box::new(expr),
                                name,
                                args,
                                safe,
                                hint: Arc::new(AccessHint::new()),
                            },
                            span,
                        );
                    } else {
                        let span = expr.span.merge(name_span);
                        expr = Expr::new(
                            ExprKind::Property {
                                target: Box::new(expr),
                                name,
                                safe,
                                hint: Arc::new(AccessHint::new()),
                            },
                            span,
                        );
                    }
                }
                TokenKind::LBracket | TokenKind::QuestionBracket => {
                    let safe = matches!(self.cursor.kind(), TokenKind::QuestionBracket);
                    self.cursor.advance();
                    let index = self.expression()?;
                    let close = self.cursor.expect(&TokenKind::RBracket, "']'")?;
                    let span = expr.span.merge(close.span);
                    expr = Expr::new(
                        ExprKind::Index {
                            target: Box::new(expr),
                            index: Box::new(index),
                            safe,
                        },
                        span,
                    );
                }
                TokenKind::LParen => {
                    let args = self.call_args()?;
                    let span = expr.span.merge(self.cursor.span());
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.cursor.expect(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.cursor.at(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.cursor.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.cursor.expect(&TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.cursor.span();
        match self.cursor.kind() {
            TokenKind::Null => {
                self.cursor.advance();
                Ok(Expr::new(ExprKind::Literal(Constant::Null), span))
            }
            TokenKind::True => {
                self.cursor.advance();
                Ok(Expr::new(ExprKind::Literal(Constant::Bool(true)), span))
            }
            TokenKind::False => {
                self.cursor.advance();
                Ok(Expr::new(ExprKind::Literal(Constant::Bool(false)), span))
            }
            TokenKind::Int(v) => {
                let v = *v;
                self.cursor.advance();
                Ok(Expr::new(ExprKind::Literal(Constant::Int(v)), span))
            }
            TokenKind::Float(v) => {
                let v = *v;
                self.cursor.advance();
                Ok(Expr::new(ExprKind::Literal(Constant::Float(v)), span))
            }
            TokenKind::Str(s) => {
                let s = Arc::clone(s);
                self.cursor.advance();
                Ok(Expr::new(ExprKind::Literal(Constant::Str(s)), span))
            }
            TokenKind::Ident(_) => {
                if matches!(self.cursor.peek(1), TokenKind::Arrow) {
                    return self.lambda();
                }
                let (name, span) = self.cursor.expect_ident("identifier")?;
                let var = match self.scopes.resolve(&name) {
                    Some(resolved) => VarRef::Local(resolved.slot),
                    None => VarRef::Global(name),
                };
                Ok(Expr::new(ExprKind::Var(var), span))
            }
            TokenKind::LParen => {
                if self.cursor.lambda_params_ahead() {
                    return self.lambda();
                }
                self.cursor.advance();
                let inner = self.expression()?;
                self.cursor.expect(&TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.array_literal(),
            TokenKind::LBrace => self.map_literal(),
            TokenKind::New => self.constructor(),
            _ => Err(self.cursor.unexpected("an expression")),
        }
    }

    fn array_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.cursor.advance();
        let mut items = Vec::new();
        if !self.cursor.at(&TokenKind::RBracket) {
            loop {
                items.push(self.expression()?);
                if !self.cursor.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.cursor.expect(&TokenKind::RBracket, "']'")?;
        let span = start.merge(close.span);
        // All-constant literals fold at parse close.
        if let Some(folded) = fold_array(&items) {
            return Ok(Expr::new(ExprKind::Literal(folded), span));
        }
        Ok(Expr::new(ExprKind::ArrayLit(items), span))
    }

    /// `{ k : v, ... }`; `{:}` is the empty map.
    fn map_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.cursor.advance();
        let mut entries = Vec::new();
        if self.cursor.at(&TokenKind::Colon) && matches!(self.cursor.peek(1), TokenKind::RBrace) {
            self.cursor.advance();
        } else if !self.cursor.at(&TokenKind::RBrace) {
            loop {
                let key = self.expression()?;
                self.cursor.expect(&TokenKind::Colon, "':'")?;
                let value = self.expression()?;
                entries.push((key, value));
                if !self.cursor.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        let close = self.cursor.expect(&TokenKind::RBrace, "'}'")?;
        let span = start.merge(close.span);
        if let Some(folded) = fold_map(&entries) {
            return Ok(Expr::new(ExprKind::Literal(folded), span));
        }
        Ok(Expr::new(ExprKind::MapLit(entries), span))
    }

    /// `new "class"(args)` / `new ident(args)`.
    fn constructor(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.require(Features::CONSTRUCTORS, "constructor calls")?;
        self.cursor.advance();
        let class = match self.cursor.kind() {
            TokenKind::Ident(name) | TokenKind::Str(name) => {
                let name = Arc::clone(name);
                self.cursor.advance();
                name
            }
            _ => return Err(self.cursor.unexpected("a class name")),
        };
        let args = self.call_args()?;
        let span = start.merge(self.cursor.span());
        Ok(Expr::new(ExprKind::New { class, args }, span))
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.merge(rhs.span);
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

fn fold_array(items: &[Expr]) -> Option<Constant> {
    let consts: Option<Vec<Constant>> = items.iter().map(|e| e.as_constant().cloned()).collect();
    consts.map(|cs| Constant::Array(cs.into()))
}

fn fold_map(entries: &[(Expr, Expr)]) -> Option<Constant> {
    let consts: Option<Vec<(Constant, Constant)>> = entries
        .iter()
        .map(|(k, v)| Some((k.as_constant()?.clone(), v.as_constant()?.clone())))
        .collect();
    consts.map(|cs| Constant::Map(cs.into()))
}
