//! # Trellis
//!
//! A parser and state machine generator for grammars whose choices can be
//! qualified by boolean guard predicates.
//!
//! ## Overview
//!
//! Trellis compiles a grammar into tables and runs them:
//!
//! - **Guards**: predicates are combined into boolean expressions with
//!   truth-table identity, so `a & b | a & !b` and `a` are the same guard
//! - **Grammars**: read from a small DSL or assembled with
//!   [`GrammarBuilder`]; `?`, `*` and `+` suffixes become helper rules
//! - **LR(1) tables**: competing guarded actions are ordered by guard
//!   priority; anything left ambiguous is a conflict
//! - **GLR parsing**: conflicts may instead be kept, and the runtime forks on
//!   them, sharing stack prefixes and merging branches with user callbacks
//! - **State machines**: guarded transitions between named states
//!
//! ## Quick Start
//!
//! ```rust
//! use trellis::{Bindings, BuildOptions, ParseToken, ParserFactory};
//!
//! // 1. Describe the language
//! let grammar = "
//!     events { i; PLUS; TIMES; }
//!     grammar(E) {
//!         E : i | E PLUS E | E TIMES E ;
//!     }";
//!
//! // 2. Build GLR tables; the grammar is ambiguous, so plain LR would fail
//! let mut factory = ParserFactory::new();
//! let error = factory
//!     .initialize_from_grammar(grammar, None, &BuildOptions::glr())
//!     .unwrap();
//! assert_eq!(error, "", "grammar rejected: {error}");
//!
//! // 3. Bind callbacks (none are needed here) and parse
//! let mut parser = factory.create_parser::<()>(Bindings::new()).unwrap();
//! let tokens = parser.tokens().clone();
//! let input: Vec<ParseToken<()>> = ["i", "PLUS", "i", "TIMES", "i"]
//!     .iter()
//!     .map(|name| ParseToken::terminal(tokens.id(name).unwrap(), None))
//!     .collect();
//! assert!(parser.parse(input).unwrap());
//!
//! // 4. Without a merge callback both readings survive
//! let mut trees: Vec<String> = parser.results().iter().map(|tree| tree.render(&tokens)).collect();
//! trees.sort();
//! assert_eq!(
//!     trees,
//!     ["E(E(E(i) PLUS E(i)) TIMES E(i))", "E(E(i) PLUS E(E(i) TIMES E(i)))"]
//! );
//! ```
//!
//! ## Modules
//!
//! - [`guard`] - Boolean guard expressions, their registry and cache
//! - [`grammar`] - Grammar model, DSL reader, desugaring and analysis
//! - [`backend`] - LR(1) construction, the GLR runtime and state machines
//! - [`parser`] - Factory, callback bindings and runnable instances
//! - [`error`] - Error types and diagnostics

pub mod backend;
pub mod error;
pub mod grammar;
pub mod guard;
pub mod parser;

// Re-export commonly used types
pub use backend::{Semantics, TableDump};
pub use error::{BindError, BuildError, CallbackError, ConflictKind, GrammarError, GuardError};
pub use grammar::{Grammar, GrammarBuilder, GrammarKind, TokenId, TokenMap};
pub use guard::{BoolExpr, Comparison, ExpressionCache, GuardId, LeafIndexProvider};
pub use parser::{Bindings, BuildOptions, Instance, ParseToken, Parser, ParserFactory, StateMachine};
