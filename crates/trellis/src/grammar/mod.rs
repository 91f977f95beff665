//! # Grammar Module
//!
//! Grammar model, construction and analysis.
//!
//! ## Overview
//!
//! A grammar is a set of terminals (events), guard predicates and rules. It is
//! either read from the grammar DSL ([`dsl::parse_grammar`]) or assembled with
//! [`GrammarBuilder`], then built into a [`Grammar`]:
//!
//! - **Tokens** get numeric ids: `$end` is 0, `error` is 1, user terminals
//!   start at 2 and nonterminals at `0x1_0000`
//! - **Elements** pair a token with an optional guard ([`GrammarElement`])
//! - **Repetition suffixes** (`?`, `*`, `+`) become helper rules with two
//!   productions each
//! - **Validation** problems are collected as [`GrammarError`](crate::GrammarError)s
//!
//! ## Usage
//!
//! ```rust
//! use trellis::grammar::dsl::parse_grammar;
//!
//! let builder = parse_grammar(
//!     "events { NUM; PLUS; }
//!      grammar(Sum) { Sum : Sum PLUS NUM | NUM ; }",
//! )
//! .unwrap();
//! let (grammar, diagnostics) = builder.build(false).unwrap();
//! assert!(diagnostics.is_empty());
//! assert_eq!(grammar.tokens().id("PLUS").map(|id| id.0), Some(3));
//! ```

pub mod analysis;
mod builder;
mod desugar;
pub mod dsl;
mod model;
mod production;
mod token;
mod validate;

pub use analysis::{FirstSets, GrammarMetrics, ReductionOrder};
pub use builder::{
    ACCEPT_SYMBOL, AlternativeSpec, ElementSpec, EventSpec, GrammarBuilder, GuardAst, GuardSpec,
    RuleSpec,
};
pub use model::{Grammar, GrammarKind, GrammarOptions, GuardDecl};
pub use production::{ActionSpec, GrammarElement, GrammarProduction, ProductionId};
pub use token::{GrammarToken, Multiplicity, TokenId, TokenMap};
