//! Guarded state transition tables.

use crate::backend::dump::{EntryDump, StateDump, TableDump};
use crate::backend::lr::{
    Candidate, CandidateKind, GuardedRow, Resolution, compute_shift_reduce_order,
};
use crate::error::{ConflictKind, GrammarError, GuardError};
use crate::grammar::{Grammar, GrammarElement, ProductionId, TokenId};
use compact_str::CompactString;
use hashbrown::HashMap;
use std::collections::BTreeMap;

/// Index of a state in a [`FsmTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FsmStateId(pub u32);

impl FsmStateId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for FsmStateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One state: its rule and the transitions leaving it, by trigger.
#[derive(Debug, Clone)]
pub struct FsmState {
    pub id: FsmStateId,
    /// The rule naming the state
    pub token: TokenId,
    pub name: CompactString,
    /// Transition productions per trigger, in guard priority order
    pub transitions: HashMap<TokenId, GuardedRow<ProductionId>, ahash::RandomState>,
}

/// Transition tables of a state machine grammar.
///
/// State 0 is the initial state. Every transition is a production
/// `State : TRIGGER[guard] Next`; transitions on the same trigger must have
/// guards that never hold together, unless one of them shadows the other.
#[derive(Debug, Clone)]
pub struct FsmTable {
    states: Vec<FsmState>,
    targets: HashMap<ProductionId, FsmStateId, ahash::RandomState>,
}

impl FsmTable {
    /// Order the transitions of every state and collect the conflicts.
    ///
    /// # Errors
    ///
    /// Returns a [`GuardError`] if a transition refers to a guard the
    /// grammar's expression cache does not know.
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(grammar: &Grammar) -> Result<(Self, Vec<GrammarError>), GuardError> {
        // the initial state first, the others in declaration order
        let mut order: Vec<TokenId> = vec![grammar.start()];
        order.extend(
            grammar
                .tokens()
                .nonterminals()
                .map(|token| token.id)
                .filter(|id| *id != grammar.start()),
        );
        let ids: HashMap<TokenId, FsmStateId, ahash::RandomState> = order
            .iter()
            .enumerate()
            .map(|(index, token)| (*token, FsmStateId(index as u32)))
            .collect();

        let mut conflicts = Vec::new();
        let mut states = Vec::with_capacity(order.len());
        let mut targets = HashMap::default();
        for (index, &token) in order.iter().enumerate() {
            let candidates: Vec<Candidate> = grammar
                .productions_for(token)
                .iter()
                .filter_map(|id| grammar.production(*id))
                .filter_map(|production| {
                    let next = production.rhs.get(1)?;
                    if let Some(target) = ids.get(&next.token) {
                        targets.insert(production.id, *target);
                    }
                    Some(Candidate::new(production.rhs[0], CandidateKind::Reduce(production.id)))
                })
                .collect();
            let ordered = compute_shift_reduce_order(grammar.guards(), &candidates)?;

            let mut transitions: HashMap<TokenId, GuardedRow<ProductionId>, ahash::RandomState> =
                HashMap::default();
            let mut slots = Vec::with_capacity(ordered.order.len());
            for candidate in &ordered.order {
                let CandidateKind::Reduce(production) = candidate.kind else {
                    continue;
                };
                let row = transitions.entry(candidate.element.token).or_default();
                slots.push(row.push(candidate.element.guard, production));
            }
            for relation in &ordered.relations {
                let first = &ordered.order[relation.first];
                let second = &ordered.order[relation.second];
                match relation.resolution {
                    Resolution::Shadows | Resolution::Disjoint => {
                        if let Some(row) = transitions.get_mut(&first.element.token) {
                            row.shadow(slots[relation.first], slots[relation.second]);
                        }
                    }
                    Resolution::Overlap(_) => {
                        conflicts.push(conflict(grammar, index as u32, first, second));
                    }
                }
            }

            states.push(FsmState {
                id: FsmStateId(index as u32),
                token,
                name: grammar.tokens().label(token),
                transitions,
            });
        }

        for conflict in &conflicts {
            tracing::debug!(%conflict, "state machine conflict");
        }
        tracing::debug!(
            states = states.len(),
            conflicts = conflicts.len(),
            "built state machine tables"
        );
        Ok((Self { states, targets }, conflicts))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[must_use]
    pub fn states(&self) -> &[FsmState] {
        &self.states
    }

    #[must_use]
    pub fn state(&self, id: FsmStateId) -> Option<&FsmState> {
        self.states.get(id.index())
    }

    /// State named `name`
    #[must_use]
    pub fn find(&self, name: &str) -> Option<FsmStateId> {
        self.states
            .iter()
            .find(|state| state.name == name)
            .map(|state| state.id)
    }

    /// Transitions from `state` on `trigger`
    #[must_use]
    pub fn transitions(
        &self,
        state: FsmStateId,
        trigger: TokenId,
    ) -> Option<&GuardedRow<ProductionId>> {
        self.state(state)?.transitions.get(&trigger)
    }

    /// State entered by taking `production`
    #[must_use]
    pub fn target(&self, production: ProductionId) -> Option<FsmStateId> {
        self.targets.get(&production).copied()
    }

    /// Describe every state's transitions in selection order.
    #[must_use]
    pub fn dump(&self, grammar: &Grammar) -> TableDump {
        let states = self
            .states
            .iter()
            .map(|state| {
                let rows: BTreeMap<TokenId, &GuardedRow<ProductionId>> = state
                    .transitions
                    .iter()
                    .map(|(token, row)| (*token, row))
                    .collect();
                let actions = rows
                    .into_iter()
                    .flat_map(|(token, row)| {
                        row.entries().iter().map(move |entry| {
                            let element = grammar.element_label(GrammarElement {
                                token,
                                guard: entry.guard,
                            });
                            let next = self
                                .target(entry.value)
                                .and_then(|target| self.state(target))
                                .map_or("?", |target| target.name.as_str());
                            let action = match grammar
                                .production(entry.value)
                                .and_then(|production| production.action.as_ref())
                            {
                                Some(action) => format!("goto {next} {{{action}}}"),
                                None => format!("goto {next}"),
                            };
                            EntryDump::new(element, action)
                        })
                    })
                    .collect();
                StateDump {
                    id: state.id.0,
                    name: Some(state.name.to_string()),
                    items: Vec::new(),
                    actions,
                    gotos: Vec::new(),
                }
            })
            .collect();
        TableDump {
            kind: grammar.kind().as_str().to_string(),
            states,
        }
    }
}

fn conflict(grammar: &Grammar, state: u32, first: &Candidate, second: &Candidate) -> GrammarError {
    let label = |candidate: &Candidate| match candidate.kind {
        CandidateKind::Reduce(production) => grammar.production_label(production),
        _ => grammar.element_label(candidate.element),
    };
    GrammarError::Conflict {
        state,
        kind: ConflictKind::Guarded,
        token: grammar.tokens().label(first.element.token),
        productions: format!("'{}' and '{}'", label(first), label(second)),
    }
}
