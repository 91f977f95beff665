//! The seam between table-driven runtimes and user callbacks.

use crate::error::CallbackError;
use crate::grammar::GrammarProduction;
use crate::guard::GuardId;
use crate::parser::ParseToken;
use std::sync::Arc;

/// Callbacks a runtime invokes while executing tables.
///
/// The GLR driver calls [`guard`](Self::guard) for guarded actions (on the
/// lookahead) and guarded gotos (on the reduced token),
/// [`reduce`](Self::reduce) for every reduction, and [`merge`](Self::merge)
/// when reductions of a rule with a merge callback meet. The state machine
/// calls `guard` on the trigger and `reduce` with the trigger as the only
/// child to run a transition's action.
///
/// Errors abort the run and are returned to the caller unchanged.
pub trait Semantics<V> {
    /// Called before each input token is processed
    fn begin_round(&mut self) {}

    /// Whether `guard` holds for `token`
    ///
    /// # Errors
    ///
    /// Any error raised by a guard callback.
    fn guard(&mut self, guard: GuardId, token: &Arc<ParseToken<V>>) -> Result<bool, CallbackError>;

    /// Value of the token produced by `production` over `children`
    ///
    /// # Errors
    ///
    /// Any error raised by an action callback.
    fn reduce(
        &mut self,
        production: &GrammarProduction,
        children: &[Arc<ParseToken<V>>],
    ) -> Result<Option<V>, CallbackError>;

    /// Pick one of several tokens that `production`'s rule derived over the
    /// same input, or `None` to drop them all.
    ///
    /// # Errors
    ///
    /// Any error raised by a merge callback.
    fn merge(
        &mut self,
        production: &GrammarProduction,
        candidates: &[Arc<ParseToken<V>>],
    ) -> Result<Option<Arc<ParseToken<V>>>, CallbackError>;
}
