//! Tokens of the grammar DSL.
//!
//! Section names and directives (`events`, `merge`, `class-name`, ...) are
//! lexed as plain identifiers and recognised by the reader from context, so
//! they stay usable as symbol names.
//!
//! Code blocks (`{ ... }` after an alternative, a guard or `merge`) and value
//! types (`<...>`) are not tokenised: the reader captures them as raw text with
//! [`DslLexer::take_balanced`].

use crate::error::SourcePos;
use logos::Logos;
use std::ops::Range;

/// All tokens of the grammar DSL
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum DslToken {
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(-[A-Za-z_][A-Za-z0-9_]*)*")]
    Ident,
    #[regex(r"[0-9]+")]
    Number,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("<")]
    LAngle,
    #[token(">")]
    RAngle,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    #[token("!")]
    Bang,
    #[token("?")]
    Question,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
}

impl DslToken {
    /// Human-readable description for error messages
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Ident => "identifier",
            Self::Number => "number",
            Self::LBrace => "'{'",
            Self::RBrace => "'}'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::LAngle => "'<'",
            Self::RAngle => "'>'",
            Self::Colon => "':'",
            Self::Semicolon => "';'",
            Self::Comma => "','",
            Self::Equals => "'='",
            Self::Pipe => "'|'",
            Self::Amp => "'&'",
            Self::Bang => "'!'",
            Self::Question => "'?'",
            Self::Star => "'*'",
            Self::Plus => "'+'",
        }
    }
}

/// A lexed token with its source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme<'src> {
    /// `None` for text that matches no token
    pub token: Option<DslToken>,
    pub text: &'src str,
    pub span: Range<usize>,
}

/// Lexer with one token of lookahead and raw block capture.
pub struct DslLexer<'src> {
    inner: logos::Lexer<'src, DslToken>,
    peeked: Option<Option<Lexeme<'src>>>,
}

impl<'src> DslLexer<'src> {
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            inner: DslToken::lexer(source),
            peeked: None,
        }
    }

    fn lex(&mut self) -> Option<Lexeme<'src>> {
        let token = self.inner.next()?;
        Some(Lexeme {
            token: token.ok(),
            text: self.inner.slice(),
            span: self.inner.span(),
        })
    }

    /// Look at the next token without consuming it
    pub fn peek(&mut self) -> Option<&Lexeme<'src>> {
        if self.peeked.is_none() {
            let next = self.lex();
            self.peeked = Some(next);
        }
        self.peeked.as_ref().and_then(Option::as_ref)
    }

    /// Consume the next token
    pub fn next_lexeme(&mut self) -> Option<Lexeme<'src>> {
        match self.peeked.take() {
            Some(peeked) => peeked,
            None => self.lex(),
        }
    }

    /// Capture raw text up to the delimiter closing an already consumed `open`.
    ///
    /// Nested pairs of `open`/`close` are balanced. The closing delimiter is
    /// consumed but not included. Returns `None` if the input ends first.
    ///
    /// Must be called right after the opening delimiter was consumed, with no
    /// token peeked.
    pub fn take_balanced(&mut self, open: char, close: char) -> Option<&'src str> {
        debug_assert!(self.peeked.is_none(), "raw capture after a peek");
        let rest = self.inner.remainder();
        let mut depth = 0usize;
        for (offset, c) in rest.char_indices() {
            if c == open {
                depth += 1;
            } else if c == close {
                if depth == 0 {
                    self.inner.bump(offset + c.len_utf8());
                    return Some(&rest[..offset]);
                }
                depth -= 1;
            }
        }
        None
    }

    /// Capture raw text up to (not including) the next `stop` character, which
    /// is left in the input.
    pub fn take_until(&mut self, stop: char) -> Option<&'src str> {
        debug_assert!(self.peeked.is_none(), "raw capture after a peek");
        let rest = self.inner.remainder();
        let offset = rest.find(stop)?;
        self.inner.bump(offset);
        Some(&rest[..offset])
    }

    /// Whether the unlexed input continues with `c` after whitespace.
    ///
    /// Valid while at most one token is peeked.
    #[must_use]
    pub fn followed_by(&self, c: char) -> bool {
        self.inner.remainder().trim_start().starts_with(c)
    }

    /// Byte offset just past the last lexed token
    #[must_use]
    pub fn offset(&self) -> usize {
        self.inner.span().end
    }

    #[must_use]
    pub fn source(&self) -> &'src str {
        self.inner.source()
    }
}

/// 1-based line and column of a byte offset
#[must_use]
pub fn position(source: &str, offset: usize) -> SourcePos {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |newline| before[newline + 1..].chars().count())
        + 1;
    SourcePos {
        line: u32::try_from(line).unwrap_or(u32::MAX),
        column: u32::try_from(column).unwrap_or(u32::MAX),
    }
}
