//! # LR(1) Automaton Builder
//!
//! Builds guarded LR(1) parse tables from a parser [`Grammar`].
//!
//! ## Overview
//!
//! Construction runs in four steps:
//!
//! 1. **Item sets**: canonical LR(1) closure/goto, with lookaheads that keep
//!    their guards ([`Automaton::build`])
//! 2. **Compression** (optional): states with identical cores are merged
//!    ([`Automaton::compress_states`])
//! 3. **Ordering**: the candidates competing for each token are ordered by
//!    guard priority ([`compute_shift_reduce_order`])
//! 4. **Tables**: ordered candidates become [`GuardedRow`]s; overlapping
//!    candidates with different actions are conflicts ([`ParseTable::build`])
//!
//! A plain LR table must be conflict free. A GLR table keeps the overlaps
//! and the runtime forks on them.

mod automaton;
mod item;
mod order;
mod table;

pub use automaton::Automaton;
pub use item::{GrammarItemSet, LrItem, StateId, Transition};
pub use order::{
    Candidate, CandidateKind, Relation, Resolution, ShiftReduceOrder, compute_shift_reduce_order,
};
pub use table::{Action, Guarded, GuardedRow, ParseTable, StateTable};

use crate::error::{GrammarError, GuardError};
use crate::grammar::{FirstSets, Grammar};

/// Everything produced for a parser grammar.
#[derive(Debug, Clone)]
pub struct LrTables {
    pub automaton: Automaton,
    pub table: ParseTable,
    /// Unresolved conflicts; fatal unless the table is for GLR
    pub conflicts: Vec<GrammarError>,
}

/// Run the whole construction.
///
/// # Errors
///
/// Returns a [`GuardError`] if an element refers to a guard the grammar's
/// expression cache does not know.
pub fn build_tables(grammar: &Grammar, compress: bool, glr: bool) -> Result<LrTables, GuardError> {
    let first = FirstSets::compute(grammar);
    let mut automaton = Automaton::build(grammar, &first);
    if compress {
        automaton.compress_states();
    }
    automaton.order_transitions(grammar)?;
    let (table, conflicts) = ParseTable::build(grammar, &automaton, glr);
    Ok(LrTables {
        automaton,
        table,
        conflicts,
    })
}
