//! State machine runtime.

use crate::backend::fsm::table::{FsmStateId, FsmTable};
use crate::backend::traits::Semantics;
use crate::error::CallbackError;
use crate::grammar::{Grammar, TokenId};
use crate::parser::ParseToken;
use std::sync::Arc;

/// Executes an [`FsmTable`], one trigger at a time.
#[derive(Debug)]
pub struct FsmDriver<V> {
    grammar: Arc<Grammar>,
    table: Arc<FsmTable>,
    current: FsmStateId,
    value: Option<V>,
    fired: usize,
}

impl<V> FsmDriver<V> {
    /// A machine in the initial state
    #[must_use]
    pub const fn new(grammar: Arc<Grammar>, table: Arc<FsmTable>) -> Self {
        Self {
            grammar,
            table,
            current: FsmStateId(0),
            value: None,
            fired: 0,
        }
    }

    #[must_use]
    pub const fn current_state(&self) -> FsmStateId {
        self.current
    }

    /// Name of the current state
    #[must_use]
    pub fn current_state_name(&self) -> &str {
        self.table
            .state(self.current)
            .map_or("", |state| state.name.as_str())
    }

    /// Value returned by the last transition action
    #[must_use]
    pub const fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// Number of transitions taken since the last reset
    #[must_use]
    pub const fn fired(&self) -> usize {
        self.fired
    }

    #[must_use]
    pub fn table(&self) -> &FsmTable {
        &self.table
    }

    /// Return to the initial state
    pub fn reset(&mut self) {
        self.current = FsmStateId(0);
        self.value = None;
        self.fired = 0;
    }

    /// Take the transition `trigger` selects from the current state.
    ///
    /// Guards are evaluated in priority order on the trigger; the action of
    /// the chosen transition receives the trigger as its only token. Returns
    /// `false`, leaving the state unchanged, when no transition applies.
    ///
    /// # Errors
    ///
    /// Any error raised by a guard or action callback.
    pub fn fire<S>(
        &mut self,
        trigger: ParseToken<V>,
        semantics: &mut S,
    ) -> Result<bool, CallbackError>
    where
        S: Semantics<V> + ?Sized,
    {
        semantics.begin_round();
        let trigger = Arc::new(trigger);
        let Some(row) = self.table.transitions(self.current, trigger.id) else {
            tracing::trace!(
                state = self.current_state_name(),
                trigger = %self.grammar.tokens().label(trigger.id),
                "no transition"
            );
            return Ok(false);
        };
        let selected = row.select(|guard| semantics.guard(guard, &trigger))?;
        let Some(&&production) = selected.first() else {
            tracing::trace!(
                state = self.current_state_name(),
                trigger = %self.grammar.tokens().label(trigger.id),
                "no transition guard holds"
            );
            return Ok(false);
        };
        let (Some(rule), Some(target)) = (
            self.grammar.production(production),
            self.table.target(production),
        ) else {
            return Ok(false);
        };
        self.value = semantics.reduce(rule, std::slice::from_ref(&trigger))?;
        tracing::trace!(
            from = self.current_state_name(),
            to = self.table.state(target).map_or("", |state| state.name.as_str()),
            "transition"
        );
        self.current = target;
        self.fired += 1;
        Ok(true)
    }

    /// Fire every trigger in order, stopping at the first one that has no
    /// transition or at `$end`.
    ///
    /// # Errors
    ///
    /// Any error raised by a guard or action callback.
    pub fn parse<I, S>(&mut self, triggers: I, semantics: &mut S) -> Result<bool, CallbackError>
    where
        I: IntoIterator<Item = ParseToken<V>>,
        S: Semantics<V> + ?Sized,
    {
        for trigger in triggers {
            if trigger.id == TokenId::END {
                break;
            }
            if !self.fire(trigger, semantics)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
