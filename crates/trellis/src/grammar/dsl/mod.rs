//! # Grammar DSL
//!
//! Reader for the textual grammar format.
//!
//! ## Overview
//!
//! A grammar file is a sequence of sections:
//!
//! ```text
//! options { namespace Calc; using std::fmt; class-name Calculator; }
//! events  { NUMBER<f64>; PLUS; MINUS = 12; }
//! guards  { isLong; isShort { len < 3 } }
//! grammar(Expr) {
//!     Expr : Expr PLUS Term { add($0, $2) }
//!          | Term
//!          ;
//!     List : Item*[isLong] ;
//!     Pair : A B merge { preferLeft } ;
//! }
//! ```
//!
//! or, for a state machine, an `fsm(Initial) { State : TRIGGER[guard] Next
//! { action } | ... ; }` section in place of `grammar`.
//!
//! Elements accept a repetition suffix (`?`, `*`, `+`) and a bracketed guard
//! expression in either order. Guard expressions combine declared guard names
//! with `!`, `&` and `|` (in decreasing precedence) and parentheses.
//!
//! `//` and `/* */` comments are allowed anywhere between tokens.

mod lexer;
mod parser;

pub use lexer::{DslLexer, DslToken, Lexeme, position};

use crate::error::GrammarError;
use crate::grammar::builder::GrammarBuilder;

/// Read grammar text into a [`GrammarBuilder`].
///
/// # Errors
///
/// Returns the first syntax error, or [`GrammarError::Empty`] when the text
/// has neither a `grammar` nor an `fsm` section.
pub fn parse_grammar(source: &str) -> Result<GrammarBuilder, GrammarError> {
    parser::DslParser::new(source).parse()
}
