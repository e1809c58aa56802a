//! Lexer built on logos.
//!
//! A raw logos pass produces `RawToken`s over the source; a cooking pass
//! turns them into spanned [`Token`]s with literal values decoded.

use std::sync::Arc;

use logos::Logos;

use rill_ir::Span;

use crate::error::{ParseError, ParseErrorKind};

/// Raw token from logos, before literal decoding.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"#[^\n]*")]
#[logos(skip r"/\*([^*]|\*[^/])*\*/")]
enum RawToken {
    #[token("var")]
    Var,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("for")]
    For,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("return")]
    Return,
    #[token("throw")]
    Throw,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("new")]
    New,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,
    #[regex(r"[0-9]+")]
    Int,
    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+")]
    Float,
    #[regex(r#""([^"\\]|\\.)*""#)]
    #[regex(r"'([^'\\]|\\.)*'")]
    Str,

    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("??")]
    QuestionQuestion,
    #[token("?.")]
    QuestionDot,
    #[token("?[")]
    QuestionBracket,
    #[token("->")]
    Arrow,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Bang,
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(".")]
    Dot,
}

/// Cooked token kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Var,
    Let,
    Const,
    If,
    Else,
    While,
    Do,
    For,
    Break,
    Continue,
    Return,
    Throw,
    Try,
    Catch,
    Finally,
    Switch,
    Case,
    Default,
    New,
    Null,
    True,
    False,

    Ident(Arc<str>),
    Int(i64),
    Float(f64),
    Str(Arc<str>),

    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    EqEq,
    NotEq,
    LtEq,
    GtEq,
    AndAnd,
    OrOr,
    QuestionQuestion,
    QuestionDot,
    QuestionBracket,
    Arrow,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eq,
    Lt,
    Gt,
    Bang,
    Question,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Dot,

    /// End of input sentinel.
    Eof,
}

impl TokenKind {
    /// Token text for "expected X, found Y" messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{name}'"),
            TokenKind::Int(v) => format!("integer {v}"),
            TokenKind::Float(v) => format!("float {v}"),
            TokenKind::Str(_) => "string literal".to_owned(),
            TokenKind::Eof => "end of input".to_owned(),
            other => format!("'{other:?}'"),
        }
    }
}

/// Spanned token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Decode a quoted string literal body, handling escapes.
fn unescape(raw: &str) -> Arc<str> {
    let body = &raw[1..raw.len() - 1];
    if !body.contains('\\') {
        return Arc::from(body);
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    Arc::from(out.as_str())
}

/// Tokenize `source`, appending an `Eof` sentinel.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut lexer = RawToken::lexer(source);
    while let Some(raw) = lexer.next() {
        let span = Span::from_range(lexer.span());
        let text = lexer.slice();
        let raw = raw.map_err(|()| {
            ParseError::new(
                ParseErrorKind::UnexpectedChar {
                    text: text.to_owned(),
                },
                span,
            )
        })?;
        let kind = match raw {
            RawToken::Var => TokenKind::Var,
            RawToken::Let => TokenKind::Let,
            RawToken::Const => TokenKind::Const,
            RawToken::If => TokenKind::If,
            RawToken::Else => TokenKind::Else,
            RawToken::While => TokenKind::While,
            RawToken::Do => TokenKind::Do,
            RawToken::For => TokenKind::For,
            RawToken::Break => TokenKind::Break,
            RawToken::Continue => TokenKind::Continue,
            RawToken::Return => TokenKind::Return,
            RawToken::Throw => TokenKind::Throw,
            RawToken::Try => TokenKind::Try,
            RawToken::Catch => TokenKind::Catch,
            RawToken::Finally => TokenKind::Finally,
            RawToken::Switch => TokenKind::Switch,
            RawToken::Case => TokenKind::Case,
            RawToken::Default => TokenKind::Default,
            RawToken::New => TokenKind::New,
            RawToken::Null => TokenKind::Null,
            RawToken::True => TokenKind::True,
            RawToken::False => TokenKind::False,
            RawToken::Ident => TokenKind::Ident(Arc::from(text)),
            RawToken::Int => match text.parse::<i64>() {
                Ok(v) => TokenKind::Int(v),
                // Magnitude beyond i64: keep it on the float rung.
                Err(_) => TokenKind::Float(text.parse::<f64>().unwrap_or(f64::INFINITY)),
            },
            RawToken::Float => TokenKind::Float(text.parse::<f64>().unwrap_or(f64::INFINITY)),
            RawToken::Str => TokenKind::Str(unescape(text)),
            RawToken::PlusEq => TokenKind::PlusEq,
            RawToken::MinusEq => TokenKind::MinusEq,
            RawToken::StarEq => TokenKind::StarEq,
            RawToken::SlashEq => TokenKind::SlashEq,
            RawToken::PercentEq => TokenKind::PercentEq,
            RawToken::EqEq => TokenKind::EqEq,
            RawToken::NotEq => TokenKind::NotEq,
            RawToken::LtEq => TokenKind::LtEq,
            RawToken::GtEq => TokenKind::GtEq,
            RawToken::AndAnd => TokenKind::AndAnd,
            RawToken::OrOr => TokenKind::OrOr,
            RawToken::QuestionQuestion => TokenKind::QuestionQuestion,
            RawToken::QuestionDot => TokenKind::QuestionDot,
            RawToken::QuestionBracket => TokenKind::QuestionBracket,
            RawToken::Arrow => TokenKind::Arrow,
            RawToken::Plus => TokenKind::Plus,
            RawToken::Minus => TokenKind::Minus,
            RawToken::Star => TokenKind::Star,
            RawToken::Slash => TokenKind::Slash,
            RawToken::Percent => TokenKind::Percent,
            RawToken::Eq => TokenKind::Eq,
            RawToken::Lt => TokenKind::Lt,
            RawToken::Gt => TokenKind::Gt,
            RawToken::Bang => TokenKind::Bang,
            RawToken::Question => TokenKind::Question,
            RawToken::Colon => TokenKind::Colon,
            RawToken::LParen => TokenKind::LParen,
            RawToken::RParen => TokenKind::RParen,
            RawToken::LBracket => TokenKind::LBracket,
            RawToken::RBracket => TokenKind::RBracket,
            RawToken::LBrace => TokenKind::LBrace,
            RawToken::RBrace => TokenKind::RBrace,
            RawToken::Comma => TokenKind::Comma,
            RawToken::Semi => TokenKind::Semi,
            RawToken::Dot => TokenKind::Dot,
        };
        tokens.push(Token { kind, span });
    }
    let end = Span::from_range(source.len()..source.len());
    tokens.push(Token {
        kind: TokenKind::Eof,
        span: end,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn operators_lex_greedily() {
        assert_eq!(
            kinds("a ?. b ?[0] ?? c"),
            vec![
                TokenKind::Ident(Arc::from("a")),
                TokenKind::QuestionDot,
                TokenKind::Ident(Arc::from("b")),
                TokenKind::QuestionBracket,
                TokenKind::Int(0),
                TokenKind::RBracket,
                TokenKind::QuestionQuestion,
                TokenKind::Ident(Arc::from("c")),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_split_int_and_float() {
        assert_eq!(
            kinds("1 2.5 3e2"),
            vec![
                TokenKind::Int(1),
                TokenKind::Float(2.5),
                TokenKind::Float(300.0),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn strings_unescape() {
        assert_eq!(
            kinds(r#" "a\nb" 'c' "#),
            vec![
                TokenKind::Str(Arc::from("a\nb")),
                TokenKind::Str(Arc::from("c")),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 // line\n# hash\n/* block */ 2"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Eof]
        );
    }

    #[test]
    fn stray_character_is_an_error() {
        assert!(tokenize("1 @ 2").is_err());
    }
}
