//! Recursive-descent grammar.
//!
//! Statements live here; the expression precedence ladder is in
//! [`expr`]. The parser drives a [`ScopeStack`] as it goes, so the tree
//! it produces already carries resolved slots and frozen scopes.

mod expr;

use std::sync::Arc;

use rill_ir::{
    DeclKind, Expr, ExprKind, Features, Lambda, LoopVar, ScopeError, ScopeStack, Span, SwitchCase,
    VarRef,
};

use crate::cursor::Cursor;
use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{Token, TokenKind};

/// Loop and switch nesting inside one function body, for `break` /
/// `continue` placement checks.
#[derive(Default)]
struct Nesting {
    loops: u32,
    switches: u32,
}

pub(crate) struct Parser {
    cursor: Cursor,
    features: Features,
    scopes: ScopeStack,
    /// One entry per open function scope.
    nesting: Vec<Nesting>,
}

impl Parser {
    pub(crate) fn new(tokens: Vec<Token>, features: Features) -> Self {
        Parser {
            cursor: Cursor::new(tokens),
            features,
            scopes: ScopeStack::new(),
            nesting: Vec::new(),
        }
    }

    pub(crate) fn begin_function(&mut self) {
        self.scopes.enter_function();
        self.nesting.push(Nesting::default());
    }

    pub(crate) fn end_function(&mut self) -> rill_ir::Scope {
        self.nesting.pop();
        self.scopes.exit_function()
    }

    pub(crate) fn declare_parameter(&mut self, name: &str) -> usize {
        self.scopes.declare_parameter(name)
    }

    /// Script body: statements up to end of input.
    pub(crate) fn parse_program(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        let stmts = self.statement_list(&TokenKind::Eof)?;
        let span = self.close_span(start);
        Ok(Expr::new(ExprKind::Block(stmts), span))
    }

    fn require(&self, feature: Features, what: &'static str) -> Result<(), ParseError> {
        if self.features.contains(feature) {
            return Ok(());
        }
        Err(ParseError::new(
            ParseErrorKind::FeatureDisabled { feature: what },
            self.cursor.span(),
        ))
    }

    /// Span from `start` to the end of the last consumed token.
    fn close_span(&self, start: Span) -> Span {
        // The cursor sits on the first unconsumed token; its start is a
        // close-enough end bound for diagnostics.
        start.merge(self.cursor.span())
    }

    fn statement_list(&mut self, end: &TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            while self.cursor.eat(&TokenKind::Semi) {}
            if self.cursor.at(end) || self.cursor.at_eof() {
                break;
            }
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Expr, ParseError> {
        match self.cursor.kind() {
            TokenKind::Var | TokenKind::Let | TokenKind::Const => self.declaration(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::Do => self.do_while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Break => self.break_statement(),
            TokenKind::Continue => self.continue_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Throw => self.throw_statement(),
            TokenKind::Try => self.try_statement(),
            TokenKind::Switch => self.switch_statement(),
            TokenKind::LBrace => self.block(),
            _ => self.expression(),
        }
    }

    /// Braced statement block with its own lexical scope.
    fn block(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.cursor.expect(&TokenKind::LBrace, "'{'")?;
        self.scopes.enter_block();
        let stmts = self.statement_list(&TokenKind::RBrace);
        self.scopes.exit_block();
        let stmts = stmts?;
        self.cursor.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Expr::new(ExprKind::Block(stmts), self.close_span(start)))
    }

    fn declaration(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        let kind = match self.cursor.advance().kind {
            TokenKind::Var => DeclKind::Var,
            TokenKind::Let => DeclKind::Let,
            _ => DeclKind::Const,
        };
        if kind != DeclKind::Var {
            self.require(Features::LEXICAL, "'let' and 'const' declarations")?;
        }
        let (name, name_span) = self.cursor.expect_ident("variable name")?;
        let slot = self.declare(&name, kind, name_span)?;
        let init = if self.cursor.eat(&TokenKind::Eq) {
            Some(Box::new(self.expression()?))
        } else if kind == DeclKind::Const {
            return Err(self.cursor.unexpected("'=' (const needs an initializer)"));
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::Decl { slot, init },
            self.close_span(start),
        ))
    }

    fn declare(&mut self, name: &str, kind: DeclKind, span: Span) -> Result<usize, ParseError> {
        self.scopes.declare_local(name, kind).map_err(|err| {
            let ScopeError::Redeclared { name } = err;
            ParseError::new(
                ParseErrorKind::Redeclared {
                    name: name.to_string(),
                },
                span,
            )
        })
    }

    fn if_statement(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.cursor.advance();
        self.cursor.expect(&TokenKind::LParen, "'('")?;
        let cond = self.expression()?;
        self.cursor.expect(&TokenKind::RParen, "')'")?;
        let then = self.statement()?;
        let other = if self.cursor.eat(&TokenKind::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then: Box::new(then),
                other,
            },
            self.close_span(start),
        ))
    }

    fn loop_body(&mut self) -> Result<Expr, ParseError> {
        if let Some(n) = self.nesting.last_mut() {
            n.loops += 1;
        }
        let body = self.statement();
        if let Some(n) = self.nesting.last_mut() {
            n.loops -= 1;
        }
        body
    }

    fn while_statement(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.require(Features::LOOPS, "loops")?;
        self.cursor.advance();
        self.cursor.expect(&TokenKind::LParen, "'('")?;
        let cond = self.expression()?;
        self.cursor.expect(&TokenKind::RParen, "')'")?;
        let body = self.loop_body()?;
        Ok(Expr::new(
            ExprKind::While {
                cond: Box::new(cond),
                body: Box::new(body),
            },
            self.close_span(start),
        ))
    }

    fn do_while_statement(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.require(Features::LOOPS, "loops")?;
        self.cursor.advance();
        let body = self.loop_body()?;
        self.cursor.expect(&TokenKind::While, "'while'")?;
        self.cursor.expect(&TokenKind::LParen, "'('")?;
        let cond = self.expression()?;
        self.cursor.expect(&TokenKind::RParen, "')'")?;
        Ok(Expr::new(
            ExprKind::DoWhile {
                body: Box::new(body),
                cond: Box::new(cond),
            },
            self.close_span(start),
        ))
    }

    /// `for (init; cond; step)` or `for (x : iterable)`, told apart by
    /// the `:` after the loop variable.
    fn for_statement(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.require(Features::LOOPS, "loops")?;
        self.cursor.advance();
        self.cursor.expect(&TokenKind::LParen, "'('")?;

        let foreach = match self.cursor.kind() {
            TokenKind::Var | TokenKind::Let => {
                matches!(self.cursor.peek(1), TokenKind::Ident(_))
                    && matches!(self.cursor.peek(2), TokenKind::Colon)
            }
            TokenKind::Ident(_) => matches!(self.cursor.peek(1), TokenKind::Colon),
            _ => false,
        };
        if foreach {
            return self.foreach_tail(start);
        }

        self.scopes.enter_block();
        let result = self.for_tail(start);
        self.scopes.exit_block();
        result
    }

    fn for_tail(&mut self, start: Span) -> Result<Expr, ParseError> {
        let init = if self.cursor.at(&TokenKind::Semi) {
            None
        } else if matches!(
            self.cursor.kind(),
            TokenKind::Var | TokenKind::Let | TokenKind::Const
        ) {
            Some(Box::new(self.declaration()?))
        } else {
            Some(Box::new(self.expression()?))
        };
        self.cursor.expect(&TokenKind::Semi, "';'")?;
        let cond = if self.cursor.at(&TokenKind::Semi) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.cursor.expect(&TokenKind::Semi, "';'")?;
        let step = if self.cursor.at(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        self.cursor.expect(&TokenKind::RParen, "')'")?;
        let body = self.loop_body()?;
        Ok(Expr::new(
            ExprKind::For {
                init,
                cond,
                step,
                body: Box::new(body),
            },
            self.close_span(start),
        ))
    }

    fn foreach_tail(&mut self, start: Span) -> Result<Expr, ParseError> {
        self.scopes.enter_block();
        let result = (|| {
            let declared = match self.cursor.kind() {
                TokenKind::Var => {
                    self.cursor.advance();
                    Some(DeclKind::Var)
                }
                TokenKind::Let => {
                    self.require(Features::LEXICAL, "'let' declarations")?;
                    self.cursor.advance();
                    Some(DeclKind::Let)
                }
                _ => None,
            };
            let (name, name_span) = self.cursor.expect_ident("loop variable")?;
            let var = match declared {
                Some(kind) => LoopVar::Local(self.declare(&name, kind, name_span)?),
                None => match self.scopes.resolve(&name) {
                    Some(resolved) => {
                        if resolved.constant {
                            return Err(ParseError::new(
                                ParseErrorKind::ConstAssign {
                                    name: name.to_string(),
                                },
                                name_span,
                            ));
                        }
                        LoopVar::Local(resolved.slot)
                    }
                    None => {
                        self.require(Features::SIDE_EFFECTS, "context variable writes")?;
                        LoopVar::Global(name)
                    }
                },
            };
            self.cursor.expect(&TokenKind::Colon, "':'")?;
            let iterable = self.expression()?;
            self.cursor.expect(&TokenKind::RParen, "')'")?;
            let body = self.loop_body()?;
            Ok(Expr::new(
                ExprKind::ForEach {
                    var,
                    iterable: Box::new(iterable),
                    body: Box::new(body),
                },
                self.close_span(start),
            ))
        })();
        self.scopes.exit_block();
        result
    }

    fn break_statement(&mut self) -> Result<Expr, ParseError> {
        let span = self.cursor.span();
        let ok = self
            .nesting
            .last()
            .is_some_and(|n| n.loops > 0 || n.switches > 0);
        if !ok {
            return Err(ParseError::new(ParseErrorKind::BreakOutsideLoop, span));
        }
        self.cursor.advance();
        Ok(Expr::new(ExprKind::Break, span))
    }

    fn continue_statement(&mut self) -> Result<Expr, ParseError> {
        let span = self.cursor.span();
        if !self.nesting.last().is_some_and(|n| n.loops > 0) {
            return Err(ParseError::new(ParseErrorKind::ContinueOutsideLoop, span));
        }
        self.cursor.advance();
        Ok(Expr::new(ExprKind::Continue, span))
    }

    fn return_statement(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.cursor.advance();
        let value = if self.at_statement_end() {
            None
        } else {
            Some(Box::new(self.expression()?))
        };
        Ok(Expr::new(ExprKind::Return(value), self.close_span(start)))
    }

    /// Whether the current token cannot start a `return` operand.
    fn at_statement_end(&self) -> bool {
        matches!(
            self.cursor.kind(),
            TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof
        )
    }

    fn throw_statement(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.cursor.advance();
        let value = self.expression()?;
        Ok(Expr::new(
            ExprKind::Throw(Box::new(value)),
            self.close_span(start),
        ))
    }

    fn try_statement(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.cursor.advance();
        let body = self.block()?;
        let mut catch_var = None;
        let mut catch = None;
        if self.cursor.eat(&TokenKind::Catch) {
            self.scopes.enter_block();
            let clause = (|| {
                if self.cursor.eat(&TokenKind::LParen) {
                    let (name, name_span) = self.cursor.expect_ident("catch variable")?;
                    catch_var = Some(self.declare(&name, DeclKind::Let, name_span)?);
                    self.cursor.expect(&TokenKind::RParen, "')'")?;
                }
                let block_start = self.cursor.span();
                self.cursor.expect(&TokenKind::LBrace, "'{'")?;
                let stmts = self.statement_list(&TokenKind::RBrace)?;
                self.cursor.expect(&TokenKind::RBrace, "'}'")?;
                Ok(Expr::new(
                    ExprKind::Block(stmts),
                    self.close_span(block_start),
                ))
            })();
            self.scopes.exit_block();
            catch = Some(Box::new(clause?));
        }
        let finally = if self.cursor.eat(&TokenKind::Finally) {
            Some(Box::new(self.block()?))
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            return Err(self.cursor.unexpected("'catch' or 'finally'"));
        }
        Ok(Expr::new(
            ExprKind::Try {
                body: Box::new(body),
                catch_var,
                catch,
                finally,
            },
            self.close_span(start),
        ))
    }

    fn switch_statement(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.cursor.advance();
        self.cursor.expect(&TokenKind::LParen, "'('")?;
        let subject = self.expression()?;
        self.cursor.expect(&TokenKind::RParen, "')'")?;
        self.cursor.expect(&TokenKind::LBrace, "'{'")?;

        if let Some(n) = self.nesting.last_mut() {
            n.switches += 1;
        }
        self.scopes.enter_block();
        let cases = self.switch_cases();
        self.scopes.exit_block();
        if let Some(n) = self.nesting.last_mut() {
            n.switches -= 1;
        }
        let cases = cases?;

        self.cursor.expect(&TokenKind::RBrace, "'}'")?;
        Ok(Expr::new(
            ExprKind::Switch {
                subject: Box::new(subject),
                cases,
            },
            self.close_span(start),
        ))
    }

    fn switch_cases(&mut self) -> Result<Vec<SwitchCase>, ParseError> {
        let mut cases = Vec::new();
        while !self.cursor.at(&TokenKind::RBrace) && !self.cursor.at_eof() {
            let test = if self.cursor.eat(&TokenKind::Case) {
                Some(self.expression()?)
            } else {
                self.cursor.expect(&TokenKind::Default, "'case' or 'default'")?;
                None
            };
            self.cursor.expect(&TokenKind::Colon, "':'")?;
            let mut body = Vec::new();
            loop {
                while self.cursor.eat(&TokenKind::Semi) {}
                if matches!(
                    self.cursor.kind(),
                    TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
                ) {
                    break;
                }
                body.push(self.statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        Ok(cases)
    }

    /// Lambda literal. The cursor sits on the parameter list: either a
    /// parenthesized list or a single bare identifier.
    fn lambda(&mut self) -> Result<Expr, ParseError> {
        let start = self.cursor.span();
        self.require(Features::LAMBDAS, "lambdas")?;
        let mut params = Vec::new();
        if self.cursor.eat(&TokenKind::LParen) {
            if !self.cursor.at(&TokenKind::RParen) {
                loop {
                    let (name, _) = self.cursor.expect_ident("parameter name")?;
                    params.push(name);
                    if !self.cursor.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.cursor.expect(&TokenKind::RParen, "')'")?;
        } else {
            let (name, _) = self.cursor.expect_ident("parameter name")?;
            params.push(name);
        }
        self.cursor.expect(&TokenKind::Arrow, "'->'")?;

        self.begin_function();
        for name in &params {
            self.scopes.declare_parameter(name);
        }
        let body = if self.cursor.at(&TokenKind::LBrace) {
            self.block()
        } else {
            self.expression()
        };
        let scope = self.end_function();
        let body = body?;

        Ok(Expr::new(
            ExprKind::Lambda(Arc::new(Lambda { scope, body })),
            self.close_span(start),
        ))
    }

    /// Const-ness and shape checks on an assignment target.
    fn check_assign_target(&self, target: &Expr, span: Span) -> Result<(), ParseError> {
        match &target.kind {
            ExprKind::Var(VarRef::Local(slot)) => {
                if let Some(symbol) = self.scopes.current_symbol(*slot) {
                    if symbol.is_const() {
                        return Err(ParseError::new(
                            ParseErrorKind::ConstAssign {
                                name: symbol.name().to_owned(),
                            },
                            span,
                        ));
                    }
                }
                Ok(())
            }
            ExprKind::Var(VarRef::Global(_)) => {
                self.require(Features::SIDE_EFFECTS, "context variable writes")
            }
            ExprKind::Property { .. } | ExprKind::Index { .. } => {
                self.require(Features::SIDE_EFFECTS, "property writes")
            }
            _ => Err(ParseError::new(ParseErrorKind::InvalidAssignTarget, span)),
        }
    }
}
