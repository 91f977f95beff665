//! LR(1) items and item sets.

use crate::backend::lr::order::{Candidate, Relation, Resolution};
use crate::grammar::{Grammar, GrammarElement, ProductionId};

/// Automaton state number. State `0` is the initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StateId(pub u32);

impl StateId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `[A → α . β, a]`: a production, a dot position and one lookahead element.
///
/// The lookahead is a terminal element and keeps its guard, so reductions on
/// `NUM` and `NUM[isSmall]` are distinct items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LrItem {
    pub production: ProductionId,
    pub dot: usize,
    pub lookahead: GrammarElement,
}

impl LrItem {
    #[must_use]
    pub const fn new(production: ProductionId, dot: usize, lookahead: GrammarElement) -> Self {
        Self {
            production,
            dot,
            lookahead,
        }
    }

    /// The element right after the dot, `None` for a complete item
    #[must_use]
    pub fn next_element(&self, grammar: &Grammar) -> Option<GrammarElement> {
        grammar
            .production(self.production)
            .and_then(|production| production.rhs.get(self.dot).copied())
    }

    /// Elements after the one following the dot
    #[must_use]
    pub fn rest<'g>(&self, grammar: &'g Grammar) -> &'g [GrammarElement] {
        grammar
            .production(self.production)
            .and_then(|production| production.rhs.get(self.dot + 1..))
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn is_complete(&self, grammar: &Grammar) -> bool {
        self.next_element(grammar).is_none()
    }

    /// The same item with the dot moved one element right
    #[must_use]
    pub const fn advanced(self) -> Self {
        Self {
            dot: self.dot + 1,
            ..self
        }
    }

    /// Production and dot, without the lookahead
    #[must_use]
    pub const fn core(&self) -> (ProductionId, usize) {
        (self.production, self.dot)
    }
}

/// A transition out of an item set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Transition {
    pub element: GrammarElement,
    pub target: StateId,
}

/// One automaton state.
///
/// `transitions` may hold several entries for the same token when they carry
/// different guards. `ordered_transitions` lists every shift, reduce, accept
/// and goto candidate of the state in guard priority order; it is filled by
/// [`Automaton::order_transitions`](crate::backend::lr::Automaton::order_transitions).
#[derive(Debug, Clone, Default)]
pub struct GrammarItemSet {
    pub id: StateId,
    /// Sorted kernel items
    pub kernel: Vec<LrItem>,
    /// Sorted closure, kernel included
    pub items: Vec<LrItem>,
    /// Sorted by element
    pub transitions: Vec<Transition>,
    pub ordered_transitions: Vec<Candidate>,
    /// Pairwise resolutions between same-token candidates, by index into
    /// `ordered_transitions`
    pub relations: Vec<Relation>,
}

impl GrammarItemSet {
    /// Candidate pairs whose guards are neither disjoint nor subset-ordered
    pub fn intersecting_pairs(&self) -> impl Iterator<Item = (&Candidate, &Candidate)> {
        self.relations
            .iter()
            .filter(|relation| relation.resolution.is_intersecting())
            .map(|relation| {
                (
                    &self.ordered_transitions[relation.first],
                    &self.ordered_transitions[relation.second],
                )
            })
    }

    /// Targets of every transition on `element`
    pub fn targets(&self, element: GrammarElement) -> impl Iterator<Item = StateId> + '_ {
        self.transitions
            .iter()
            .filter(move |transition| transition.element == element)
            .map(|transition| transition.target)
    }

    /// Whether any two same-token candidates may both apply
    #[must_use]
    pub fn has_overlap(&self) -> bool {
        self.relations
            .iter()
            .any(|relation| matches!(relation.resolution, Resolution::Overlap(_)))
    }
}
