//! Token cursor.
//!
//! Low-level access, lookahead, and consumption over the cooked token
//! stream. The stream always ends with an `Eof` sentinel, so `current`
//! never runs off the end.

use std::mem;
use std::sync::Arc;

use rill_ir::Span;

use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{Token, TokenKind};

pub(crate) struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
}

impl Cursor {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        debug_assert!(matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof));
        Cursor { tokens, pos: 0 }
    }

    #[inline]
    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    #[inline]
    pub(crate) fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    #[inline]
    pub(crate) fn span(&self) -> Span {
        self.current().span
    }

    /// Token kind `n` positions ahead (0 = current).
    pub(crate) fn peek(&self, n: usize) -> &TokenKind {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    #[inline]
    pub(crate) fn at_eof(&self) -> bool {
        matches!(self.kind(), TokenKind::Eof)
    }

    /// Consume and return the current token.
    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// Whether the current token has the same discriminant as `kind`.
    #[inline]
    pub(crate) fn at(&self, kind: &TokenKind) -> bool {
        mem::discriminant(self.kind()) == mem::discriminant(kind)
    }

    /// Consume the current token if it matches `kind`.
    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a token matching `kind` or fail with "expected ...".
    pub(crate) fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.at(kind) {
            return Ok(self.advance());
        }
        Err(self.unexpected(what))
    }

    /// Consume an identifier token, returning its name.
    pub(crate) fn expect_ident(&mut self, what: &str) -> Result<(Arc<str>, Span), ParseError> {
        if let TokenKind::Ident(name) = self.kind() {
            let name = Arc::clone(name);
            let span = self.span();
            self.advance();
            return Ok((name, span));
        }
        Err(self.unexpected(what))
    }

    /// Error describing the current token as unexpected.
    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let kind = if self.at_eof() {
            ParseErrorKind::UnexpectedEof {
                expected: expected.to_owned(),
            }
        } else {
            ParseErrorKind::UnexpectedToken {
                expected: expected.to_owned(),
                found: self.kind().describe(),
            }
        };
        ParseError::new(kind, self.span())
    }

    /// With the cursor on `(`, whether the matching `)` is followed by
    /// `->`. Decides between a lambda parameter list and a parenthesized
    /// expression without speculative parsing.
    pub(crate) fn lambda_params_ahead(&self) -> bool {
        debug_assert!(matches!(self.kind(), TokenKind::LParen));
        let mut depth = 0usize;
        let mut idx = self.pos;
        while idx < self.tokens.len() {
            match &self.tokens[idx].kind {
                TokenKind::LParen | TokenKind::QuestionBracket | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => {
                    depth -= 1;
                    if depth == 0 {
                        return self
                            .tokens
                            .get(idx + 1)
                            .is_some_and(|t| t.kind == TokenKind::Arrow);
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            idx += 1;
        }
        false
    }
}
