//! Guarded LR action and goto tables.

use crate::backend::dump::{EntryDump, StateDump, TableDump};
use crate::backend::lr::automaton::Automaton;
use crate::backend::lr::item::{GrammarItemSet, StateId};
use crate::backend::lr::order::{Candidate, CandidateKind, Resolution};
use crate::error::{ConflictKind, GrammarError};
use crate::grammar::{Grammar, GrammarElement, ProductionId, TokenId};
use crate::guard::GuardId;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// A parse action on a terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Shift(StateId),
    Reduce(ProductionId),
    Accept,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shift(state) => write!(f, "shift {state}"),
            Self::Reduce(production) => write!(f, "reduce {production}"),
            Self::Accept => f.write_str("accept"),
        }
    }
}

/// A table entry that applies only when its guard holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guarded<T> {
    pub guard: Option<GuardId>,
    pub value: T,
}

/// The entries of one `(state, token)` cell in priority order.
///
/// `shadows` holds `(earlier, later)` index pairs: once `earlier` is selected,
/// `later` is skipped without evaluating its guard.
#[derive(Debug, Clone)]
pub struct GuardedRow<T> {
    entries: SmallVec<[Guarded<T>; 2]>,
    shadows: SmallVec<[(u16, u16); 2]>,
}

impl<T> Default for GuardedRow<T> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
            shadows: SmallVec::new(),
        }
    }
}

impl<T: PartialEq> GuardedRow<T> {
    #[must_use]
    pub fn entries(&self) -> &[Guarded<T>] {
        &self.entries
    }

    pub(crate) fn push(&mut self, guard: Option<GuardId>, value: T) -> usize {
        self.entries.push(Guarded { guard, value });
        self.entries.len() - 1
    }

    pub(crate) fn shadow(&mut self, earlier: usize, later: usize) {
        if let (Ok(earlier), Ok(later)) = (u16::try_from(earlier), u16::try_from(later)) {
            self.shadows.push((earlier, later));
        }
    }

    fn is_shadowed(&self, chosen: &[usize], index: usize) -> bool {
        chosen.iter().any(|&earlier| {
            self.shadows
                .iter()
                .any(|&(e, l)| usize::from(e) == earlier && usize::from(l) == index)
        })
    }

    /// Every applicable value, in priority order and without duplicates.
    ///
    /// Guards are evaluated lazily through `holds`; entries shadowed by an
    /// already selected entry are not evaluated at all. A deterministic table
    /// selects at most one value.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `holds`.
    pub fn select<E>(
        &self,
        mut holds: impl FnMut(GuardId) -> Result<bool, E>,
    ) -> Result<SmallVec<[&T; 2]>, E> {
        let mut chosen: SmallVec<[usize; 2]> = SmallVec::new();
        let mut values: SmallVec<[&T; 2]> = SmallVec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if self.is_shadowed(&chosen, index) {
                continue;
            }
            if let Some(guard) = entry.guard
                && !holds(guard)?
            {
                continue;
            }
            chosen.push(index);
            if !values.contains(&&entry.value) {
                values.push(&entry.value);
            }
        }
        Ok(values)
    }
}

/// Action and goto rows of one state.
#[derive(Debug, Clone, Default)]
pub struct StateTable {
    pub actions: HashMap<TokenId, GuardedRow<Action>, ahash::RandomState>,
    pub gotos: HashMap<TokenId, GuardedRow<StateId>, ahash::RandomState>,
}

/// Parse tables generated from an [`Automaton`].
#[derive(Debug, Clone, Default)]
pub struct ParseTable {
    states: Vec<StateTable>,
    glr: bool,
}

impl ParseTable {
    /// Build tables from an automaton whose transitions have been ordered.
    ///
    /// Returns every unresolved conflict. For a plain LR table (`glr` false)
    /// a non-empty list means the grammar is rejected; a GLR table keeps the
    /// overlapping entries and forks on them at run time.
    #[must_use]
    pub fn build(grammar: &Grammar, automaton: &Automaton, glr: bool) -> (Self, Vec<GrammarError>) {
        let mut conflicts: Vec<GrammarError> = Vec::new();
        let mut states = Vec::with_capacity(automaton.len());

        for item_set in automaton.states() {
            let mut table = StateTable::default();
            let mut slots: Vec<(TokenId, usize)> =
                Vec::with_capacity(item_set.ordered_transitions.len());
            for candidate in &item_set.ordered_transitions {
                let token = candidate.element.token;
                let guard = candidate.element.guard;
                let slot = match candidate.kind {
                    CandidateKind::Shift(target) => {
                        table.actions.entry(token).or_default().push(guard, Action::Shift(target))
                    }
                    CandidateKind::Reduce(production) => table
                        .actions
                        .entry(token)
                        .or_default()
                        .push(guard, Action::Reduce(production)),
                    CandidateKind::Accept => {
                        table.actions.entry(token).or_default().push(guard, Action::Accept)
                    }
                    CandidateKind::Goto(target) => {
                        table.gotos.entry(token).or_default().push(guard, target)
                    }
                };
                slots.push((token, slot));
            }

            for relation in &item_set.relations {
                let (token, earlier) = slots[relation.first];
                let (_, later) = slots[relation.second];
                let first = &item_set.ordered_transitions[relation.first];
                let second = &item_set.ordered_transitions[relation.second];
                match relation.resolution {
                    Resolution::Shadows | Resolution::Disjoint => {
                        if token.is_terminal() {
                            if let Some(row) = table.actions.get_mut(&token) {
                                row.shadow(earlier, later);
                            }
                        } else if let Some(row) = table.gotos.get_mut(&token) {
                            row.shadow(earlier, later);
                        }
                    }
                    Resolution::Overlap(_) if first.kind != second.kind => {
                        let conflict = conflict(grammar, item_set, first, second);
                        if !conflicts.contains(&conflict) {
                            conflicts.push(conflict);
                        }
                    }
                    Resolution::Overlap(_) => {}
                }
            }
            states.push(table);
        }

        let outcome = if glr { "kept for forking" } else { "unresolved" };
        for conflict in &conflicts {
            tracing::debug!(%conflict, outcome, "table conflict");
        }
        tracing::debug!(
            states = states.len(),
            conflicts = conflicts.len(),
            glr,
            "built parse tables"
        );
        (Self { states, glr }, conflicts)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Whether the table may hold overlapping entries
    #[must_use]
    pub const fn is_glr(&self) -> bool {
        self.glr
    }

    #[must_use]
    pub fn state(&self, id: StateId) -> Option<&StateTable> {
        self.states.get(id.index())
    }

    #[must_use]
    pub fn actions(&self, state: StateId, token: TokenId) -> Option<&GuardedRow<Action>> {
        self.state(state)?.actions.get(&token)
    }

    #[must_use]
    pub fn gotos(&self, state: StateId, token: TokenId) -> Option<&GuardedRow<StateId>> {
        self.state(state)?.gotos.get(&token)
    }

    /// Unguarded or guarded shift of `token` from `state`, if any
    #[must_use]
    pub fn shift_target(&self, state: StateId, token: TokenId) -> Option<StateId> {
        self.actions(state, token)?
            .entries()
            .iter()
            .find_map(|entry| match entry.value {
                Action::Shift(target) => Some(target),
                _ => None,
            })
    }

    /// Terminals with an action in `state`, sorted by id
    #[must_use]
    pub fn expected(&self, state: StateId) -> Vec<TokenId> {
        let mut tokens: Vec<TokenId> = self
            .state(state)
            .map(|table| table.actions.keys().copied().collect())
            .unwrap_or_default();
        tokens.sort_unstable();
        tokens
    }

    /// Describe the tables together with the automaton's items.
    #[must_use]
    pub fn dump(&self, grammar: &Grammar, automaton: &Automaton) -> TableDump {
        let label = |guard: Option<GuardId>, token: TokenId| {
            grammar.element_label(GrammarElement { token, guard })
        };
        let states = automaton
            .states()
            .iter()
            .zip(&self.states)
            .map(|(item_set, table)| {
                let actions: BTreeMap<TokenId, &GuardedRow<Action>> =
                    table.actions.iter().map(|(token, row)| (*token, row)).collect();
                let gotos: BTreeMap<TokenId, &GuardedRow<StateId>> =
                    table.gotos.iter().map(|(token, row)| (*token, row)).collect();
                StateDump {
                    id: item_set.id.0,
                    name: None,
                    items: kernel_labels(grammar, item_set),
                    actions: actions
                        .into_iter()
                        .flat_map(|(token, row)| {
                            row.entries().iter().map(move |entry| {
                                let action = match entry.value {
                                    Action::Reduce(production) => format!(
                                        "reduce {production} ({})",
                                        grammar.production_label(production)
                                    ),
                                    other => other.to_string(),
                                };
                                EntryDump::new(label(entry.guard, token), action)
                            })
                        })
                        .collect(),
                    gotos: gotos
                        .into_iter()
                        .flat_map(|(token, row)| {
                            row.entries().iter().map(move |entry| {
                                EntryDump::new(label(entry.guard, token), entry.value.to_string())
                            })
                        })
                        .collect(),
                }
            })
            .collect();
        TableDump {
            kind: grammar.kind().as_str().to_string(),
            states,
        }
    }
}

/// `Lhs : α . β  [a b c]` for each kernel core
fn kernel_labels(grammar: &Grammar, item_set: &GrammarItemSet) -> Vec<String> {
    let mut cores: Vec<((ProductionId, usize), Vec<String>)> = Vec::new();
    for item in &item_set.kernel {
        let lookahead = grammar.element_label(item.lookahead);
        match cores.iter_mut().find(|(core, _)| *core == item.core()) {
            Some((_, lookaheads)) => lookaheads.push(lookahead),
            None => cores.push((item.core(), vec![lookahead])),
        }
    }
    cores
        .into_iter()
        .map(|((production, dot), lookaheads)| {
            format!(
                "{}  [{}]",
                grammar.item_label(production, Some(dot)),
                lookaheads.join(" ")
            )
        })
        .collect()
}

fn conflict(
    grammar: &Grammar,
    item_set: &GrammarItemSet,
    first: &Candidate,
    second: &Candidate,
) -> GrammarError {
    let reduces = |candidate: &Candidate| {
        matches!(candidate.kind, CandidateKind::Reduce(_) | CandidateKind::Accept)
    };
    let kind = match (reduces(first), reduces(second)) {
        (true, true) => ConflictKind::ReduceReduce,
        (false, false) => ConflictKind::Guarded,
        _ => ConflictKind::ShiftReduce,
    };
    GrammarError::Conflict {
        state: item_set.id.0,
        kind,
        token: grammar.tokens().label(first.element.token),
        productions: format!(
            "'{}' and '{}'",
            describe(grammar, item_set, first),
            describe(grammar, item_set, second)
        ),
    }
}

fn describe(grammar: &Grammar, item_set: &GrammarItemSet, candidate: &Candidate) -> String {
    match candidate.kind {
        CandidateKind::Reduce(production) => {
            let len = grammar.production(production).map_or(0, |p| p.len());
            grammar.item_label(production, Some(len))
        }
        CandidateKind::Accept => grammar.item_label(ProductionId(0), Some(1)),
        CandidateKind::Shift(_) | CandidateKind::Goto(_) => item_set
            .items
            .iter()
            .find(|item| item.next_element(grammar) == Some(candidate.element))
            .map_or_else(
                || grammar.element_label(candidate.element),
                |item| grammar.item_label(item.production, Some(item.dot)),
            ),
    }
}
