//! # Error Types
//!
//! Error types for guard algebra, grammar construction, callback binding and
//! table generation.
//!
//! ## Overview
//!
//! Errors fall into two groups:
//!
//! - **Hard errors** abort construction immediately: [`GuardError`] (too many
//!   guard variables, unknown guard handles), [`BindError`] (a callback the
//!   grammar needs was never bound) and [`BuildError`].
//! - **Diagnostics** are collected while reading and validating a grammar:
//!   [`GrammarError`]. The construction API renders the first one as text and
//!   reports success with an empty string.
//!
//! Errors raised by user callbacks travel unchanged as [`CallbackError`].
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, errors integrate with [`miette`]
//! and carry stable diagnostic codes.

pub mod diagnostics;

use compact_str::CompactString;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Error type returned by guard, action and merge callbacks.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the boolean guard engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GuardError {
    #[error("guard '{name}' exceeds the limit of {limit} guard variables")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(guard::capacity)))]
    CapacityExceeded { name: CompactString, limit: usize },

    #[error("guard operand {operand} is not known to the expression cache")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(guard::missing_operand)))]
    MissingOperand { operand: u32 },
}

impl GuardError {
    /// Create a capacity error for the variable that did not fit
    #[must_use]
    pub fn capacity_exceeded(name: &str, limit: usize) -> Self {
        Self::CapacityExceeded {
            name: CompactString::from(name),
            limit,
        }
    }

    /// Create a missing operand error
    #[must_use]
    pub const fn missing_operand(operand: u32) -> Self {
        Self::MissingOperand { operand }
    }
}

/// Source position of a diagnostic inside grammar text (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A grammar diagnostic.
///
/// These never abort construction on their own; they are collected and the
/// first one is reported.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("{pos}: syntax error: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::syntax)))]
    Syntax { pos: SourcePos, message: String },

    #[error("undefined symbol '{name}' referenced from rule '{rule}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::undefined_symbol)))]
    UndefinedSymbol {
        name: CompactString,
        rule: CompactString,
    },

    #[error("undefined guard '{name}' referenced from rule '{rule}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::undefined_guard)))]
    UndefinedGuard {
        name: CompactString,
        rule: CompactString,
    },

    #[error("'{name}' is declared more than once")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::duplicate)))]
    Duplicate { name: CompactString },

    #[error("token id {id} of '{name}' is reserved or already in use")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::token_id)))]
    InvalidTokenId { name: CompactString, id: u32 },

    #[error("start symbol '{name}' is not a rule")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::start_symbol)))]
    UndefinedStart { name: CompactString },

    #[error("no grammar or fsm section found")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::empty)))]
    Empty,

    #[error("action '{action}' of production {production} refers to ${index} of {len} elements")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::action_argument)))]
    ActionArgument {
        production: u32,
        action: String,
        index: usize,
        len: usize,
    },

    #[error("malformed action '{text}' in rule '{rule}'")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::action_syntax)))]
    ActionSyntax { rule: CompactString, text: String },

    #[error("state '{state}': {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::transition)))]
    InvalidTransition {
        state: CompactString,
        message: String,
    },

    #[error("state {state}: {kind} conflict on '{token}' between {productions}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::conflict)))]
    Conflict {
        state: u32,
        kind: ConflictKind,
        token: CompactString,
        productions: String,
    },
}

impl GrammarError {
    /// Create a syntax error at a position
    #[must_use]
    pub fn syntax(pos: SourcePos, message: impl Into<String>) -> Self {
        Self::Syntax {
            pos,
            message: message.into(),
        }
    }

    /// Create an undefined symbol error
    #[must_use]
    pub fn undefined_symbol(name: &str, rule: &str) -> Self {
        Self::UndefinedSymbol {
            name: name.into(),
            rule: rule.into(),
        }
    }

    /// Create an undefined guard error
    #[must_use]
    pub fn undefined_guard(name: &str, rule: &str) -> Self {
        Self::UndefinedGuard {
            name: name.into(),
            rule: rule.into(),
        }
    }

    /// Create a duplicate declaration error
    #[must_use]
    pub fn duplicate(name: &str) -> Self {
        Self::Duplicate { name: name.into() }
    }

    /// Position in the grammar text, for syntax errors
    #[must_use]
    pub const fn position(&self) -> Option<SourcePos> {
        match self {
            Self::Syntax { pos, .. } => Some(*pos),
            _ => None,
        }
    }

    /// Whether this diagnostic describes a table conflict
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Kind of table conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
    /// Two guarded shifts (or gotos) on the same token that may both hold
    Guarded,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ShiftReduce => "shift/reduce",
            Self::ReduceReduce => "reduce/reduce",
            Self::Guarded => "guarded transition",
        })
    }
}

/// Hard errors that stop table construction.
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum BuildError {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Guard(#[from] GuardError),

    #[error("failed to write output: {0}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(build::io)))]
    Io(#[from] std::io::Error),
}

/// Errors binding callbacks to a built grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum BindError {
    #[error("no grammar has been initialized")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(bind::uninitialized)))]
    Uninitialized,

    #[error("grammar builds a {built} but a {requested} was requested")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(bind::kind)))]
    WrongKind {
        built: &'static str,
        requested: &'static str,
    },

    #[error("guard '{name}' has no bound predicate")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(bind::guard)))]
    MissingGuard { name: CompactString },

    #[error("action '{name}' has no bound callback")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(bind::action)))]
    MissingAction { name: CompactString },

    #[error("merge '{name}' has no bound callback")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(bind::merge)))]
    MissingMerge { name: CompactString },
}
