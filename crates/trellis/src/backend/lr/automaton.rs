//! Canonical LR(1) item-set construction and LALR-style compression.

use crate::backend::lr::item::{GrammarItemSet, LrItem, StateId, Transition};
use crate::backend::lr::order::{Candidate, CandidateKind, compute_shift_reduce_order};
use crate::error::GuardError;
use crate::grammar::{FirstSets, Grammar, GrammarElement, ProductionId};
use hashbrown::{HashMap, HashSet};
use std::collections::{BTreeMap, VecDeque};

/// The LR(1) automaton of a parser grammar.
#[derive(Debug, Clone, Default)]
pub struct Automaton {
    states: Vec<GrammarItemSet>,
}

impl Automaton {
    /// Build the canonical LR(1) automaton.
    ///
    /// State 0 is the closure of `[$accept → . Start, $end]`. States are
    /// numbered breadth-first, and transitions of a state are explored in
    /// element order, so numbering is deterministic.
    #[must_use]
    pub fn build(grammar: &Grammar, first: &FirstSets) -> Self {
        let mut states: Vec<GrammarItemSet> = Vec::new();
        let mut by_kernel: HashMap<Vec<LrItem>, StateId, ahash::RandomState> = HashMap::default();
        let mut pending = VecDeque::new();

        let initial = vec![LrItem::new(ProductionId(0), 0, GrammarElement::end())];
        by_kernel.insert(initial.clone(), StateId(0));
        states.push(GrammarItemSet {
            id: StateId(0),
            items: closure(grammar, first, &initial),
            kernel: initial,
            ..GrammarItemSet::default()
        });
        pending.push_back(StateId(0));

        while let Some(state) = pending.pop_front() {
            let mut gotos: BTreeMap<GrammarElement, Vec<LrItem>> = BTreeMap::new();
            for item in &states[state.index()].items {
                if let Some(element) = item.next_element(grammar) {
                    gotos.entry(element).or_default().push(item.advanced());
                }
            }

            let mut transitions = Vec::with_capacity(gotos.len());
            for (element, mut kernel) in gotos {
                kernel.sort_unstable();
                kernel.dedup();
                let target = if let Some(existing) = by_kernel.get(&kernel) {
                    *existing
                } else {
                    #[allow(clippy::cast_possible_truncation)]
                    let id = StateId(states.len() as u32);
                    by_kernel.insert(kernel.clone(), id);
                    states.push(GrammarItemSet {
                        id,
                        items: closure(grammar, first, &kernel),
                        kernel,
                        ..GrammarItemSet::default()
                    });
                    pending.push_back(id);
                    id
                };
                transitions.push(Transition { element, target });
            }
            states[state.index()].transitions = transitions;
        }

        tracing::debug!(states = states.len(), "built canonical LR(1) automaton");
        Self { states }
    }

    #[must_use]
    pub fn states(&self) -> &[GrammarItemSet] {
        &self.states
    }

    #[must_use]
    pub fn state(&self, id: StateId) -> Option<&GrammarItemSet> {
        self.states.get(id.index())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Merge states whose items have identical cores.
    ///
    /// Each merged state keeps the number of its first member in the new
    /// numbering, so state 0 stays the initial state. Lookaheads are unioned,
    /// which may introduce reduce/reduce conflicts the canonical automaton did
    /// not have. Returns the number of states removed.
    pub fn compress_states(&mut self) -> usize {
        let before = self.states.len();
        let mut by_core: HashMap<Vec<(ProductionId, usize)>, StateId, ahash::RandomState> =
            HashMap::default();
        let mut remap: Vec<StateId> = Vec::with_capacity(before);
        let mut merged: Vec<GrammarItemSet> = Vec::new();

        for state in &self.states {
            let mut core: Vec<(ProductionId, usize)> =
                state.kernel.iter().map(LrItem::core).collect();
            core.dedup();
            if let Some(&target) = by_core.get(&core) {
                remap.push(target);
                let into = &mut merged[target.index()];
                into.kernel.extend_from_slice(&state.kernel);
                into.items.extend_from_slice(&state.items);
                into.transitions.extend_from_slice(&state.transitions);
            } else {
                #[allow(clippy::cast_possible_truncation)]
                let id = StateId(merged.len() as u32);
                by_core.insert(core, id);
                remap.push(id);
                merged.push(GrammarItemSet {
                    id,
                    kernel: state.kernel.clone(),
                    items: state.items.clone(),
                    transitions: state.transitions.clone(),
                    ..GrammarItemSet::default()
                });
            }
        }

        for state in &mut merged {
            state.kernel.sort_unstable();
            state.kernel.dedup();
            state.items.sort_unstable();
            state.items.dedup();
            for transition in &mut state.transitions {
                transition.target = remap[transition.target.index()];
            }
            state.transitions.sort_unstable();
            state.transitions.dedup();
        }

        self.states = merged;
        let removed = before - self.states.len();
        tracing::debug!(before, after = self.states.len(), "compressed LR(1) states");
        removed
    }

    /// Collect and order every state's shift, reduce, accept and goto
    /// candidates by guard priority.
    ///
    /// Exact duplicates are collapsed, and a guarded candidate is dropped
    /// when the same action is also available unguarded on its token.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::MissingOperand`] if an element's guard is not in
    /// the grammar's expression cache.
    pub fn order_transitions(&mut self, grammar: &Grammar) -> Result<(), GuardError> {
        for state in &mut self.states {
            let mut candidates: Vec<Candidate> = state
                .transitions
                .iter()
                .map(|transition| {
                    let kind = if transition.element.token.is_terminal() {
                        CandidateKind::Shift(transition.target)
                    } else {
                        CandidateKind::Goto(transition.target)
                    };
                    Candidate::new(transition.element, kind)
                })
                .collect();
            for item in &state.items {
                if !item.is_complete(grammar) {
                    continue;
                }
                let kind = if item.production == ProductionId(0) {
                    CandidateKind::Accept
                } else {
                    CandidateKind::Reduce(item.production)
                };
                candidates.push(Candidate::new(item.lookahead, kind));
            }

            let mut seen: HashSet<Candidate, ahash::RandomState> = HashSet::default();
            candidates.retain(|candidate| seen.insert(*candidate));
            candidates.retain(|candidate| {
                candidate.element.guard.is_none()
                    || !seen.contains(&Candidate::new(
                        GrammarElement::new(candidate.element.token),
                        candidate.kind,
                    ))
            });

            let order = compute_shift_reduce_order(grammar.guards(), &candidates)?;
            state.ordered_transitions = order.order;
            state.relations = order.relations;
        }
        Ok(())
    }
}

/// Close a kernel under `[A → α . B β, a]  ⇒  [B → . γ, b]` for every `b` in
/// FIRST(β a).
fn closure(grammar: &Grammar, first: &FirstSets, kernel: &[LrItem]) -> Vec<LrItem> {
    let mut items: HashSet<LrItem, ahash::RandomState> = kernel.iter().copied().collect();
    let mut pending: Vec<LrItem> = kernel.to_vec();

    while let Some(item) = pending.pop() {
        let Some(next) = item.next_element(grammar) else {
            continue;
        };
        if !next.token.is_nonterminal() {
            continue;
        }
        let lookaheads = first.first_of_sequence(item.rest(grammar), item.lookahead);
        for &production in grammar.productions_for(next.token) {
            for &lookahead in &lookaheads {
                let added = LrItem::new(production, 0, lookahead);
                if items.insert(added) {
                    pending.push(added);
                }
            }
        }
    }

    let mut items: Vec<LrItem> = items.into_iter().collect();
    items.sort_unstable();
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::lr::order::Resolution;
    use crate::grammar::dsl::parse_grammar;

    fn grammar(source: &str) -> Grammar {
        let (grammar, diagnostics) = parse_grammar(source).unwrap().build(false).unwrap();
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        grammar
    }

    fn automaton(grammar: &Grammar) -> Automaton {
        let first = FirstSets::compute(grammar);
        Automaton::build(grammar, &first)
    }

    #[test]
    fn test_initial_state_closure() {
        let g = grammar("events { a; b; } grammar(S) { S : A b ; A : a ; }");
        let automaton = automaton(&g);
        let initial = &automaton.states()[0];
        assert_eq!(initial.kernel.len(), 1);
        // $accept : . S ; S : . A b ; A : . a
        assert_eq!(initial.items.len(), 3);
        let b = g.tokens().id("b").unwrap();
        let a_rule = g.productions_for(g.tokens().id("A").unwrap())[0];
        assert!(
            initial
                .items
                .contains(&LrItem::new(a_rule, 0, GrammarElement::new(b)))
        );
    }

    #[test]
    fn test_small_grammar_state_count() {
        let g = grammar("events { a; b; } grammar(S) { S : A b ; A : a ; }");
        let automaton = automaton(&g);
        // 0: initial, S, A, a, A b
        assert_eq!(automaton.len(), 5);
    }

    #[test]
    fn test_compression_merges_identical_cores() {
        // Classic LR(1) grammar whose canonical automaton duplicates the
        // `C : d .` and `C : c . C` states under different lookaheads.
        let g = grammar("events { c; d; } grammar(S) { S : C C ; C : c C | d ; }");
        let mut automaton = automaton(&g);
        assert_eq!(automaton.len(), 10);
        let removed = automaton.compress_states();
        assert_eq!(removed, 3);
        assert_eq!(automaton.len(), 7);
        assert_eq!(automaton.states()[0].kernel.len(), 1);
        for state in automaton.states() {
            for transition in &state.transitions {
                assert!(transition.target.index() < automaton.len());
            }
        }
    }

    #[test]
    fn test_ambiguous_grammar_has_overlaps() {
        let g = grammar(
            "events { i; PLUS; TIMES; }
             grammar(E) { E : i | E PLUS E | E TIMES E ; }",
        );
        let mut automaton = automaton(&g);
        automaton.order_transitions(&g).unwrap();
        assert!(automaton.states().iter().any(GrammarItemSet::has_overlap));
    }

    #[test]
    fn test_guarded_lookaheads_are_ordered() {
        let g = grammar(
            "events { NUM; }
             guards { small; }
             grammar(S) { S : A NUM[small] | B NUM ; A : ; B : ; }",
        );
        let mut automaton = automaton(&g);
        automaton.order_transitions(&g).unwrap();
        let initial = &automaton.states()[0];
        let num = g.tokens().id("NUM").unwrap();
        let reduces: Vec<&Candidate> = initial
            .ordered_transitions
            .iter()
            .filter(|candidate| candidate.element.token == num)
            .collect();
        assert_eq!(reduces.len(), 2);
        assert!(reduces[0].element.guard.is_some());
        assert!(reduces[1].element.guard.is_none());
        assert_eq!(initial.relations.len(), 1);
        assert_eq!(initial.relations[0].resolution, Resolution::Shadows);
    }
}
