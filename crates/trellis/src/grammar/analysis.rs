//! # Grammar Analysis
//!
//! Nullable and FIRST sets over guarded elements, the order in which
//! reductions over one base are completed, and summary metrics.
//!
//! FIRST sets are computed over [`GrammarElement`]s rather than bare tokens:
//! a guarded terminal `NUM[isSmall]` contributes the guarded element, so LR(1)
//! lookaheads keep their guards and reductions can be ordered by them.

use crate::grammar::model::Grammar;
use crate::grammar::production::GrammarElement;
use crate::grammar::token::TokenId;
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};

/// Nullable set and FIRST sets of every nonterminal.
#[derive(Debug, Clone, Default)]
pub struct FirstSets {
    nullable: HashSet<TokenId, ahash::RandomState>,
    first: HashMap<TokenId, Vec<GrammarElement>, ahash::RandomState>,
}

impl FirstSets {
    /// Compute by fixpoint iteration
    #[must_use]
    pub fn compute(grammar: &Grammar) -> Self {
        let mut nullable: HashSet<TokenId, ahash::RandomState> = HashSet::default();
        let mut first: HashMap<TokenId, HashSet<GrammarElement>, ahash::RandomState> =
            HashMap::default();

        let mut changed = true;
        let mut rounds = 0usize;
        while changed {
            changed = false;
            rounds += 1;
            for production in grammar.productions() {
                let mut additions: Vec<GrammarElement> = Vec::new();
                let mut all_nullable = true;
                for element in &production.rhs {
                    if element.token.is_terminal() {
                        additions.push(*element);
                        all_nullable = false;
                        break;
                    }
                    if let Some(set) = first.get(&element.token) {
                        additions.extend(set.iter().copied());
                    }
                    if !nullable.contains(&element.token) {
                        all_nullable = false;
                        break;
                    }
                }
                let entry = first.entry(production.lhs).or_default();
                for element in additions {
                    changed |= entry.insert(element);
                }
                if all_nullable {
                    changed |= nullable.insert(production.lhs);
                }
            }
        }
        tracing::trace!(rounds, nullable = nullable.len(), "computed FIRST sets");

        let first = first
            .into_iter()
            .map(|(token, set)| {
                let mut elements: Vec<GrammarElement> = set.into_iter().collect();
                elements.sort_unstable();
                (token, elements)
            })
            .collect();
        Self { nullable, first }
    }

    /// Whether `token` derives the empty string
    #[must_use]
    pub fn is_nullable(&self, token: TokenId) -> bool {
        self.nullable.contains(&token)
    }

    /// FIRST set of a nonterminal, sorted
    #[must_use]
    pub fn first(&self, token: TokenId) -> &[GrammarElement] {
        self.first.get(&token).map_or(&[][..], Vec::as_slice)
    }

    /// FIRST of `sequence` followed by `lookahead`.
    #[must_use]
    pub fn first_of_sequence(
        &self,
        sequence: &[GrammarElement],
        lookahead: GrammarElement,
    ) -> SmallVec<[GrammarElement; 4]> {
        let mut result: SmallVec<[GrammarElement; 4]> = SmallVec::new();
        let push = |element: GrammarElement, result: &mut SmallVec<[GrammarElement; 4]>| {
            if !result.contains(&element) {
                result.push(element);
            }
        };
        for element in sequence {
            if element.token.is_terminal() {
                push(*element, &mut result);
                return result;
            }
            for first in self.first(element.token) {
                push(*first, &mut result);
            }
            if !self.is_nullable(element.token) {
                return result;
            }
        }
        push(lookahead, &mut result);
        result
    }
}

/// Rank of every nonterminal for completing reductions.
///
/// `A` ranks below `D` when some production `D : α A β` has nullable `α` and
/// `β`: a reading of `D` over a base may then consist of a reading of `A` over
/// the same base, so every reading of `A` must exist first. Nonterminals on a
/// cycle of such productions rank after the others, in token order.
#[derive(Debug, Clone, Default)]
pub struct ReductionOrder {
    ranks: HashMap<TokenId, usize, ahash::RandomState>,
}

impl ReductionOrder {
    #[must_use]
    pub fn compute(grammar: &Grammar) -> Self {
        let first = FirstSets::compute(grammar);
        let nullable = |element: &GrammarElement| {
            !element.token.is_terminal() && first.is_nullable(element.token)
        };

        let mut below: BTreeMap<TokenId, BTreeSet<TokenId>> = BTreeMap::new();
        let mut pending: BTreeMap<TokenId, usize> = BTreeMap::new();
        for production in grammar.productions() {
            pending.entry(production.lhs).or_default();
        }
        for production in grammar.productions() {
            for (index, element) in production.rhs.iter().enumerate() {
                if element.token.is_terminal() || element.token == production.lhs {
                    continue;
                }
                let rest_nullable = production
                    .rhs
                    .iter()
                    .enumerate()
                    .all(|(other, element)| other == index || nullable(element));
                if rest_nullable && below.entry(element.token).or_default().insert(production.lhs) {
                    *pending.entry(production.lhs).or_default() += 1;
                }
            }
        }

        let mut ready: BTreeSet<TokenId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(token, _)| *token)
            .collect();
        let mut ranks: HashMap<TokenId, usize, ahash::RandomState> = HashMap::default();
        while let Some(token) = ready.pop_first() {
            ranks.insert(token, ranks.len());
            for above in below.get(&token).into_iter().flatten() {
                if let Some(count) = pending.get_mut(above) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*above);
                    }
                }
            }
        }
        let cyclic: Vec<TokenId> = pending
            .keys()
            .filter(|token| !ranks.contains_key(*token))
            .copied()
            .collect();
        if !cyclic.is_empty() {
            tracing::debug!(count = cyclic.len(), "nonterminals derive themselves");
        }
        for token in cyclic {
            ranks.insert(token, ranks.len());
        }
        Self { ranks }
    }

    /// Rank of `token`; tokens without productions rank last
    #[must_use]
    pub fn rank(&self, token: TokenId) -> usize {
        self.ranks.get(&token).copied().unwrap_or(usize::MAX)
    }
}

/// Metrics about a grammar's size and shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarMetrics {
    /// Number of productions, including synthesized ones
    pub production_count: usize,
    pub terminal_count: usize,
    pub nonterminal_count: usize,
    /// Helper nonterminals created for repetition suffixes
    pub synthetic_count: usize,
    pub nullable_count: usize,
    /// Nonterminals with a directly left-recursive production
    pub left_recursive_count: usize,
    pub guarded_element_count: usize,
    pub distinct_guard_count: usize,
}

impl GrammarMetrics {
    #[must_use]
    pub fn compute(grammar: &Grammar) -> Self {
        let first = FirstSets::compute(grammar);
        let tokens = grammar.tokens();
        let left_recursive: HashSet<TokenId> = grammar
            .productions()
            .iter()
            .filter(|production| {
                production
                    .rhs
                    .first()
                    .is_some_and(|element| element.token == production.lhs)
            })
            .map(|production| production.lhs)
            .collect();
        Self {
            production_count: grammar.productions().len(),
            terminal_count: tokens.terminals().count(),
            nonterminal_count: tokens.nonterminals().count(),
            synthetic_count: tokens.iter().filter(|token| token.is_synthetic()).count(),
            nullable_count: tokens
                .nonterminals()
                .filter(|token| first.is_nullable(token.id))
                .count(),
            left_recursive_count: left_recursive.len(),
            guarded_element_count: grammar
                .productions()
                .iter()
                .flat_map(|production| production.rhs.iter())
                .filter(|element| element.guard.is_some())
                .count(),
            distinct_guard_count: grammar.guards().len(),
        }
    }
}
