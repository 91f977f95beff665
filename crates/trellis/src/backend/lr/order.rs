//! Guard priority ordering of competing transitions.
//!
//! Within one state several shifts, reductions and gotos can compete for the
//! same token when they carry different guards. They are ordered by strict
//! priority:
//!
//! 1. guarded candidates before unguarded ones (the unguarded one is the
//!    fallback);
//! 2. when one guard provably implies the other, the more specific first;
//! 3. otherwise the guard with the lower hamming weight (fewer satisfying
//!    assignments) first;
//! 4. a stable tie-break on token id, guard identifier, kind (shift before
//!    reduce before accept) and target number.
//!
//! A strict subset always has a strictly lower weight, so rules 2 and 3 never
//! disagree and the order is total.

use crate::backend::lr::item::StateId;
use crate::error::GuardError;
use crate::grammar::{GrammarElement, ProductionId};
use crate::guard::{Comparison, ExpressionCache, GuardId};
use hashbrown::HashMap;
use std::cmp::Ordering;

/// What a candidate does when chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    Shift(StateId),
    Reduce(ProductionId),
    Accept,
    /// Nonterminal transition taken after a reduction
    Goto(StateId),
}

impl CandidateKind {
    const fn rank(self) -> u8 {
        match self {
            Self::Shift(_) => 0,
            Self::Reduce(_) => 1,
            Self::Accept => 2,
            Self::Goto(_) => 3,
        }
    }

    const fn target_number(self) -> u32 {
        match self {
            Self::Shift(state) | Self::Goto(state) => state.0,
            Self::Reduce(production) => production.0,
            Self::Accept => 0,
        }
    }
}

/// A guarded transition competing for its token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub element: GrammarElement,
    pub kind: CandidateKind,
}

impl Candidate {
    #[must_use]
    pub const fn new(element: GrammarElement, kind: CandidateKind) -> Self {
        Self { element, kind }
    }
}

/// How an earlier candidate relates to a later one on the same token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The guards never hold together
    Disjoint,
    /// Whenever the earlier candidate applies the later one is skipped
    Shadows,
    /// Both may apply: a conflict for LR, a fork for GLR. `None` when neither
    /// is guarded.
    Overlap(Option<Comparison>),
}

impl Resolution {
    /// Whether the guards intersect without either implying the other
    #[must_use]
    pub const fn is_intersecting(self) -> bool {
        matches!(
            self,
            Self::Overlap(Some(Comparison::Intersect | Comparison::Independent))
        )
    }
}

/// Resolution between `order[first]` and `order[second]`, `first < second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub first: usize,
    pub second: usize,
    pub resolution: Resolution,
}

/// Candidates in priority order with the pairwise resolutions between
/// same-token candidates.
#[derive(Debug, Clone, Default)]
pub struct ShiftReduceOrder {
    pub order: Vec<Candidate>,
    pub relations: Vec<Relation>,
}

struct GuardFacts<'c> {
    weights: HashMap<GuardId, u64, ahash::RandomState>,
    identifiers: HashMap<GuardId, &'c str, ahash::RandomState>,
    comparisons: HashMap<(GuardId, GuardId), Comparison, ahash::RandomState>,
}

impl<'c> GuardFacts<'c> {
    fn collect(cache: &'c ExpressionCache, candidates: &[Candidate]) -> Result<Self, GuardError> {
        let mut guards: Vec<GuardId> = candidates
            .iter()
            .filter_map(|candidate| candidate.element.guard)
            .collect();
        guards.sort_unstable();
        guards.dedup();

        let mut facts = Self {
            weights: HashMap::default(),
            identifiers: HashMap::default(),
            comparisons: HashMap::default(),
        };
        for (position, &guard) in guards.iter().enumerate() {
            facts.weights.insert(guard, cache.hamming_weight(guard)?);
            let identifier = cache
                .identifier(guard)
                .ok_or(GuardError::missing_operand(guard.0))?;
            facts.identifiers.insert(guard, identifier);
            for &other in &guards[position + 1..] {
                let comparison = cache.compare(guard, other)?;
                facts.comparisons.insert((guard, other), comparison);
                facts.comparisons.insert((other, guard), comparison.reversed());
            }
        }
        Ok(facts)
    }

    fn comparison(&self, left: GuardId, right: GuardId) -> Comparison {
        if left == right {
            return Comparison::Equal;
        }
        self.comparisons
            .get(&(left, right))
            .copied()
            .unwrap_or(Comparison::Intersect)
    }

    fn priority(&self, left: &Candidate, right: &Candidate) -> Ordering {
        match (left.element.guard, right.element.guard) {
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(l), Some(r)) if l != r => match self.comparison(l, r) {
                Comparison::LeftSubsetOfRight => Ordering::Less,
                Comparison::RightSubsetOfLeft => Ordering::Greater,
                _ => self.weights[&l]
                    .cmp(&self.weights[&r])
                    .then_with(|| self.tie_break(left, right)),
            },
            _ => self.tie_break(left, right),
        }
    }

    fn tie_break(&self, left: &Candidate, right: &Candidate) -> Ordering {
        let identifier = |candidate: &Candidate| {
            candidate
                .element
                .guard
                .and_then(|guard| self.identifiers.get(&guard).copied())
        };
        left.element
            .token
            .cmp(&right.element.token)
            .then_with(|| identifier(left).cmp(&identifier(right)))
            .then_with(|| left.kind.rank().cmp(&right.kind.rank()))
            .then_with(|| left.kind.target_number().cmp(&right.kind.target_number()))
    }

    fn resolve(&self, earlier: &Candidate, later: &Candidate) -> Resolution {
        match (earlier.element.guard, later.element.guard) {
            (None, None) | (None, Some(_)) => Resolution::Overlap(None),
            (Some(_), None) => Resolution::Shadows,
            (Some(e), Some(l)) => match self.comparison(e, l) {
                Comparison::Disjoint => Resolution::Disjoint,
                Comparison::LeftSubsetOfRight => Resolution::Shadows,
                other => Resolution::Overlap(Some(other)),
            },
        }
    }
}

/// Order `candidates` by guard priority and resolve every same-token pair.
///
/// # Errors
///
/// Returns [`GuardError::MissingOperand`] if a candidate's guard is not in
/// `cache`.
pub fn compute_shift_reduce_order(
    cache: &ExpressionCache,
    candidates: &[Candidate],
) -> Result<ShiftReduceOrder, GuardError> {
    let facts = GuardFacts::collect(cache, candidates)?;

    let mut order = candidates.to_vec();
    order.sort_by(|left, right| facts.priority(left, right));

    let mut relations = Vec::new();
    for first in 0..order.len() {
        for second in first + 1..order.len() {
            if order[first].element.token != order[second].element.token {
                continue;
            }
            let resolution = facts.resolve(&order[first], &order[second]);
            relations.push(Relation {
                first,
                second,
                resolution,
            });
        }
    }
    tracing::trace!(
        candidates = order.len(),
        relations = relations.len(),
        "ordered guarded transitions"
    );
    Ok(ShiftReduceOrder { order, relations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::TokenId;
    use crate::guard::{BoolExpr, LeafIndexProvider};

    struct Fixture {
        leaves: LeafIndexProvider,
        cache: ExpressionCache,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                leaves: LeafIndexProvider::new(),
                cache: ExpressionCache::new(),
            }
        }

        fn leaf(&mut self, name: &str) -> BoolExpr {
            BoolExpr::leaf(name, &mut self.leaves).unwrap()
        }

        fn intern(&mut self, expr: &BoolExpr) -> GuardId {
            self.cache.intern(expr, &self.leaves)
        }
    }

    const NUM: TokenId = TokenId(2);

    fn shift(guard: Option<GuardId>, target: u32) -> Candidate {
        Candidate::new(
            GrammarElement { token: NUM, guard },
            CandidateKind::Shift(StateId(target)),
        )
    }

    fn reduce(guard: Option<GuardId>, production: u32) -> Candidate {
        Candidate::new(
            GrammarElement { token: NUM, guard },
            CandidateKind::Reduce(ProductionId(production)),
        )
    }

    #[test]
    fn test_unguarded_last() {
        let mut fx = Fixture::new();
        let a = fx.leaf("A");
        let ga = fx.intern(&a);
        let result =
            compute_shift_reduce_order(&fx.cache, &[reduce(None, 3), shift(Some(ga), 4)]).unwrap();
        assert_eq!(result.order, vec![shift(Some(ga), 4), reduce(None, 3)]);
        assert_eq!(result.relations[0].resolution, Resolution::Shadows);
    }

    #[test]
    fn test_subset_ranks_first() {
        let mut fx = Fixture::new();
        let a = fx.leaf("A");
        let b = fx.leaf("B");
        let ga = fx.intern(&a);
        let gab = fx.intern(&(&a & &b));
        let result =
            compute_shift_reduce_order(&fx.cache, &[shift(Some(ga), 1), reduce(Some(gab), 2)])
                .unwrap();
        assert_eq!(result.order, vec![reduce(Some(gab), 2), shift(Some(ga), 1)]);
        assert_eq!(result.relations[0].resolution, Resolution::Shadows);
    }

    #[test]
    fn test_lower_weight_first_and_intersecting() {
        let mut fx = Fixture::new();
        let a = fx.leaf("A");
        let b = fx.leaf("B");
        let c = fx.leaf("C");
        let gc = fx.intern(&c);
        let gab = fx.intern(&(&a & &b));
        let result =
            compute_shift_reduce_order(&fx.cache, &[shift(Some(gc), 1), reduce(Some(gab), 2)])
                .unwrap();
        assert_eq!(result.order, vec![reduce(Some(gab), 2), shift(Some(gc), 1)]);
        let resolution = result.relations[0].resolution;
        assert_eq!(resolution, Resolution::Overlap(Some(Comparison::Independent)));
        assert!(resolution.is_intersecting());
    }

    #[test]
    fn test_equal_weight_tie_break_is_pinned() {
        let mut fx = Fixture::new();
        let a = fx.leaf("A");
        let b = fx.leaf("B");
        let gb = fx.intern(&b);
        let ga = fx.intern(&a);
        // Identifiers "A_2" < "B_2"; then shift before reduce for the same guard.
        let result = compute_shift_reduce_order(
            &fx.cache,
            &[reduce(Some(gb), 1), reduce(Some(ga), 5), shift(Some(ga), 9)],
        )
        .unwrap();
        assert_eq!(
            result.order,
            vec![shift(Some(ga), 9), reduce(Some(ga), 5), reduce(Some(gb), 1)]
        );
    }

    #[test]
    fn test_disjoint_guards() {
        let mut fx = Fixture::new();
        let a = fx.leaf("A");
        let ga = fx.intern(&a);
        let gna = fx.intern(&!&a);
        let result =
            compute_shift_reduce_order(&fx.cache, &[shift(Some(ga), 1), reduce(Some(gna), 2)])
                .unwrap();
        assert_eq!(result.relations[0].resolution, Resolution::Disjoint);
        assert!(!result.relations[0].resolution.is_intersecting());
    }

    #[test]
    fn test_both_unguarded_overlap() {
        let fx = Fixture::new();
        let result =
            compute_shift_reduce_order(&fx.cache, &[reduce(None, 2), shift(None, 1)]).unwrap();
        assert_eq!(result.order, vec![shift(None, 1), reduce(None, 2)]);
        assert_eq!(result.relations[0].resolution, Resolution::Overlap(None));
    }

    #[test]
    fn test_different_tokens_are_not_related() {
        let fx = Fixture::new();
        let other = Candidate::new(
            GrammarElement::new(TokenId(3)),
            CandidateKind::Shift(StateId(7)),
        );
        let result = compute_shift_reduce_order(&fx.cache, &[other, shift(None, 1)]).unwrap();
        assert!(result.relations.is_empty());
        assert_eq!(result.order[0], shift(None, 1));
    }

    #[test]
    fn test_unknown_guard_is_missing_operand() {
        let fx = Fixture::new();
        let error =
            compute_shift_reduce_order(&fx.cache, &[shift(Some(GuardId(4)), 1)]).unwrap_err();
        assert_eq!(error, GuardError::missing_operand(4));
    }
}
