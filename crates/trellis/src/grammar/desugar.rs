//! Repetition suffix desugaring.
//!
//! `X?`, `X*` and `X+` are replaced by a helper nonterminal with exactly two
//! productions:
//!
//! | suffix | helper         | productions                         |
//! |--------|----------------|-------------------------------------|
//! | `?`    | `zeroOrOne_X`  | `X` and empty                       |
//! | `*`    | `zeroToMany_X` | `zeroToMany_X X` and empty          |
//! | `+`    | `oneToMany_X`  | `oneToMany_X X` and `X`             |
//!
//! A guard written on the suffixed element moves onto the `X` elements of the
//! helper productions; the helper name then carries the guard identifier.

use crate::grammar::builder::BuildState;
use crate::grammar::production::GrammarElement;
use crate::grammar::token::{Multiplicity, TokenId};
use crate::guard::GuardId;
use hashbrown::HashMap;
use smallvec::{SmallVec, smallvec};

#[derive(Debug, Default)]
pub(crate) struct Desugarer {
    helpers: HashMap<(TokenId, Option<GuardId>, Multiplicity), TokenId>,
}

impl Desugarer {
    /// Element referring to the helper for `element` repeated by `multiplicity`.
    ///
    /// Helper productions are appended to the build state the first time a
    /// combination is seen, so they precede the production being built.
    pub(crate) fn expand(
        &mut self,
        state: &mut BuildState,
        element: GrammarElement,
        multiplicity: Multiplicity,
    ) -> GrammarElement {
        if multiplicity == Multiplicity::One {
            return element;
        }
        let key = (element.token, element.guard, multiplicity);
        if let Some(helper) = self.helpers.get(&key) {
            return GrammarElement::new(*helper);
        }

        let base = format!(
            "{}_{}",
            multiplicity.helper_prefix(),
            state.tokens.label(element.token)
        );
        let base = match element.guard.and_then(|guard| state.guards.identifier(guard)) {
            Some(identifier) => format!("{base}_{identifier}"),
            None => base,
        };
        let mut name = base.clone();
        let mut suffix = 1;
        let helper = loop {
            if let Some(id) = state.add_nonterminal(&name, multiplicity) {
                break id;
            }
            suffix += 1;
            name = format!("{base}_{suffix}");
        };

        let recurse = GrammarElement::new(helper);
        let (first, second): (SmallVec<[GrammarElement; 4]>, SmallVec<[GrammarElement; 4]>) =
            match multiplicity {
                Multiplicity::ZeroOrOne => (smallvec![element], SmallVec::new()),
                Multiplicity::ZeroToMany => (smallvec![recurse, element], SmallVec::new()),
                Multiplicity::OneToMany | Multiplicity::One => {
                    (smallvec![recurse, element], smallvec![element])
                }
            };
        state.push_production(helper, first, None, None);
        state.push_production(helper, second, None, None);
        tracing::trace!(helper = %name, "synthesized repetition helper");

        self.helpers.insert(key, helper);
        GrammarElement::new(helper)
    }
}
