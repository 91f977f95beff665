//! Grammar validation.
//!
//! Checks that need the whole grammar: action argument ranges, the shape of
//! state machine transitions, and reachability (reported through `tracing`
//! only, unreachable rules are not an error).

use crate::error::GrammarError;
use crate::grammar::model::{Grammar, GrammarKind};
use crate::grammar::token::TokenId;
use hashbrown::HashSet;

pub(crate) fn validate(grammar: &Grammar, diagnostics: &mut Vec<GrammarError>) {
    check_action_arguments(grammar, diagnostics);
    if grammar.kind() == GrammarKind::StateMachine {
        check_transitions(grammar, diagnostics);
    }
    for token in unreachable(grammar) {
        tracing::debug!(
            rule = %grammar.tokens().label(token),
            "rule is unreachable from the start symbol"
        );
    }
}

fn check_action_arguments(grammar: &Grammar, diagnostics: &mut Vec<GrammarError>) {
    for production in grammar.productions() {
        let Some(action) = &production.action else {
            continue;
        };
        if let Some(index) = action.max_index()
            && index >= production.len()
        {
            diagnostics.push(GrammarError::ActionArgument {
                production: production.id.0,
                action: action.to_string(),
                index,
                len: production.len(),
            });
        }
    }
}

fn check_transitions(grammar: &Grammar, diagnostics: &mut Vec<GrammarError>) {
    for production in grammar.productions() {
        let shape_ok = production.rhs.len() == 2
            && production.rhs[0].token.is_terminal()
            && production.rhs[1].token.is_nonterminal()
            && production.rhs[1].guard.is_none();
        if !shape_ok {
            diagnostics.push(GrammarError::InvalidTransition {
                state: grammar.tokens().label(production.lhs),
                message: format!(
                    "'{}' is not of the form TRIGGER[guard] NextState",
                    grammar.production_label(production.id)
                ),
            });
        }
    }
}

/// Nonterminals that no derivation from the start symbol uses
fn unreachable(grammar: &Grammar) -> Vec<TokenId> {
    let mut reached: HashSet<TokenId> = HashSet::new();
    let mut pending = vec![grammar.start()];
    while let Some(token) = pending.pop() {
        if !reached.insert(token) {
            continue;
        }
        for id in grammar.productions_for(token) {
            if let Some(production) = grammar.production(*id) {
                pending.extend(
                    production
                        .rhs
                        .iter()
                        .map(|element| element.token)
                        .filter(|token| token.is_nonterminal()),
                );
            }
        }
    }
    grammar
        .tokens()
        .nonterminals()
        .map(|token| token.id)
        .filter(|id| {
            !reached.contains(id)
                && grammar.tokens().name(*id) != Some(crate::grammar::ACCEPT_SYMBOL)
        })
        .collect()
}
