//! Named callbacks and their resolution against a grammar.

use crate::backend::traits::Semantics;
use crate::error::{BindError, CallbackError};
use crate::grammar::{ActionSpec, Grammar, GrammarProduction};
use crate::guard::GuardId;
use crate::parser::ParseToken;
use compact_str::CompactString;
use hashbrown::HashMap;
use std::fmt;
use std::sync::Arc;

/// Guard predicate: whether the guard holds for a token.
pub type GuardFn<V> = Box<dyn FnMut(&ParseToken<V>) -> Result<bool, CallbackError>>;
/// Semantic action: the value of a reduction from the selected tokens.
pub type ActionFn<V> = Box<dyn FnMut(&[Arc<ParseToken<V>>]) -> Result<V, CallbackError>>;
/// Merge callback: the surviving token among ambiguous candidates, if any.
pub type MergeFn<V> =
    Box<dyn FnMut(&[Arc<ParseToken<V>>]) -> Result<Option<Arc<ParseToken<V>>>, CallbackError>>;

/// Callbacks bound by name.
///
/// Guard predicates are bound by the names declared in the `guards` section,
/// actions and merges by the names productions refer to. Names the grammar
/// does not use are ignored.
///
/// ```rust
/// use trellis::parser::Bindings;
///
/// let bindings = Bindings::<f64>::new()
///     .guard("isPositive", |token| Ok(token.value().is_some_and(|v| *v > 0.0)))
///     .action("add", |tokens| {
///         let value = |i: usize| tokens[i].value().copied().unwrap_or_default();
///         Ok(value(0) + value(2))
///     });
/// assert!(bindings.has_action("add"));
/// ```
pub struct Bindings<V> {
    guards: HashMap<CompactString, GuardFn<V>, ahash::RandomState>,
    actions: HashMap<CompactString, ActionFn<V>, ahash::RandomState>,
    merges: HashMap<CompactString, MergeFn<V>, ahash::RandomState>,
}

impl<V> Default for Bindings<V> {
    fn default() -> Self {
        Self {
            guards: HashMap::default(),
            actions: HashMap::default(),
            merges: HashMap::default(),
        }
    }
}

impl<V> fmt::Debug for Bindings<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("guards", &self.guards.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("merges", &self.merges.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<V> Bindings<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the predicate of a declared guard
    #[must_use]
    pub fn guard<F>(mut self, name: &str, predicate: F) -> Self
    where
        F: FnMut(&ParseToken<V>) -> Result<bool, CallbackError> + 'static,
    {
        self.guards.insert(name.into(), Box::new(predicate));
        self
    }

    /// Bind an action callback
    #[must_use]
    pub fn action<F>(mut self, name: &str, action: F) -> Self
    where
        F: FnMut(&[Arc<ParseToken<V>>]) -> Result<V, CallbackError> + 'static,
    {
        self.actions.insert(name.into(), Box::new(action));
        self
    }

    /// Bind a merge callback
    #[must_use]
    pub fn merge<F>(mut self, name: &str, merge: F) -> Self
    where
        F: FnMut(&[Arc<ParseToken<V>>]) -> Result<Option<Arc<ParseToken<V>>>, CallbackError>
            + 'static,
    {
        self.merges.insert(name.into(), Box::new(merge));
        self
    }

    #[must_use]
    pub fn has_guard(&self, name: &str) -> bool {
        self.guards.contains_key(name)
    }

    #[must_use]
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    #[must_use]
    pub fn has_merge(&self, name: &str) -> bool {
        self.merges.contains_key(name)
    }

    /// Resolve every name `grammar` uses.
    ///
    /// # Errors
    ///
    /// Returns a [`BindError`] naming the first guard, action or merge the
    /// grammar uses without a bound callback.
    pub(crate) fn resolve(mut self, grammar: Arc<Grammar>) -> Result<Callbacks<V>, BindError> {
        let mut used_leaves = 0u64;
        for production in grammar.productions() {
            for element in &production.rhs {
                if let Some(expr) = element.guard.and_then(|guard| grammar.guard(guard)) {
                    used_leaves |= expr.leaves();
                }
            }
        }

        let mut predicates: Vec<Option<GuardFn<V>>> = Vec::new();
        for decl in grammar.guard_decls() {
            let index = decl.index as usize;
            if predicates.len() <= index {
                predicates.resize_with(index + 1, || None);
            }
            match self.guards.remove(decl.name.as_str()) {
                Some(predicate) => predicates[index] = Some(predicate),
                None if used_leaves & (1 << decl.index) != 0 => {
                    return Err(BindError::MissingGuard {
                        name: decl.name.clone(),
                    });
                }
                None => {}
            }
        }
        for name in grammar.action_names() {
            if !self.actions.contains_key(name) {
                return Err(BindError::MissingAction { name: name.into() });
            }
        }
        for name in grammar.merge_names() {
            if !self.merges.contains_key(name) {
                return Err(BindError::MissingMerge { name: name.into() });
            }
        }
        tracing::debug!(
            guards = predicates.iter().flatten().count(),
            actions = self.actions.len(),
            merges = self.merges.len(),
            "resolved callbacks"
        );
        Ok(Callbacks {
            grammar,
            predicates,
            actions: self.actions,
            merges: self.merges,
            memo: HashMap::default(),
        })
    }
}

/// [`Bindings`] resolved against one grammar.
///
/// Guard expressions are evaluated over the bound predicates; a predicate's
/// result for a token is remembered until the next round. The memo holds the
/// token itself, so its address cannot be reused by another token before the
/// memo is cleared.
pub(crate) struct Callbacks<V> {
    grammar: Arc<Grammar>,
    predicates: Vec<Option<GuardFn<V>>>,
    actions: HashMap<CompactString, ActionFn<V>, ahash::RandomState>,
    merges: HashMap<CompactString, MergeFn<V>, ahash::RandomState>,
    memo: HashMap<(u32, usize), (Arc<ParseToken<V>>, bool), ahash::RandomState>,
}

impl<V: Clone> Semantics<V> for Callbacks<V> {
    fn begin_round(&mut self) {
        self.memo.clear();
    }

    fn guard(&mut self, guard: GuardId, token: &Arc<ParseToken<V>>) -> Result<bool, CallbackError> {
        let Some(expr) = self.grammar.guard(guard) else {
            return Ok(false);
        };
        let address = Arc::as_ptr(token) as usize;
        let predicates = &mut self.predicates;
        let memo = &mut self.memo;
        expr.evaluate(&mut |leaf| {
            if let Some((_, holds)) = memo.get(&(leaf, address)) {
                return Ok(*holds);
            }
            let holds = match predicates.get_mut(leaf as usize).and_then(Option::as_mut) {
                Some(predicate) => predicate(&**token)?,
                None => false,
            };
            memo.insert((leaf, address), (Arc::clone(token), holds));
            Ok(holds)
        })
    }

    fn reduce(
        &mut self,
        production: &GrammarProduction,
        children: &[Arc<ParseToken<V>>],
    ) -> Result<Option<V>, CallbackError> {
        let passed = |index: usize| children.get(index).and_then(|child| child.value().cloned());
        match &production.action {
            None if children.len() == 1 => Ok(passed(0)),
            None => Ok(None),
            Some(ActionSpec::PassThrough(index)) => Ok(passed(*index)),
            Some(ActionSpec::Call { name, args }) => {
                let Some(action) = self.actions.get_mut(name.as_str()) else {
                    return Ok(None);
                };
                let value = match args {
                    None => action(children)?,
                    Some(args) => {
                        let selected: Vec<Arc<ParseToken<V>>> = args
                            .iter()
                            .filter_map(|index| children.get(*index).cloned())
                            .collect();
                        action(&selected)?
                    }
                };
                Ok(Some(value))
            }
        }
    }

    fn merge(
        &mut self,
        production: &GrammarProduction,
        candidates: &[Arc<ParseToken<V>>],
    ) -> Result<Option<Arc<ParseToken<V>>>, CallbackError> {
        match production
            .merge
            .as_deref()
            .and_then(|name| self.merges.get_mut(name))
        {
            Some(merge) => merge(candidates),
            None => Ok(candidates.first().cloned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::parse_grammar;
    use crate::grammar::TokenId;
    use std::cell::Cell;
    use std::rc::Rc;

    fn grammar(source: &str) -> Arc<Grammar> {
        let (grammar, diagnostics) = parse_grammar(source).unwrap().build(false).unwrap();
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        Arc::new(grammar)
    }

    const SOURCE: &str = "events { NUM; PLUS; }
        guards { big; unused; }
        grammar(S) {
            S : S PLUS NUM[big] { add($0, $2) }
              | NUM { $0 }
              | PLUS NUM
              ;
        }";

    #[test]
    fn test_missing_callbacks() {
        let grammar = grammar(SOURCE);
        let missing_guard = Bindings::<i64>::new()
            .action("add", |_| Ok(0))
            .resolve(Arc::clone(&grammar));
        assert!(matches!(missing_guard, Err(BindError::MissingGuard { name }) if name == "big"));

        let missing_action = Bindings::<i64>::new()
            .guard("big", |_| Ok(true))
            .resolve(Arc::clone(&grammar));
        assert!(matches!(missing_action, Err(BindError::MissingAction { name }) if name == "add"));

        // `unused` guards nothing, so it need not be bound
        assert!(Bindings::<i64>::new()
            .guard("big", |_| Ok(true))
            .action("add", |_| Ok(0))
            .resolve(grammar)
            .is_ok());
    }

    #[test]
    fn test_default_and_selected_actions() {
        let grammar = grammar(SOURCE);
        let mut callbacks = Bindings::<i64>::new()
            .guard("big", |_| Ok(true))
            .action("add", |tokens| {
                assert_eq!(tokens.len(), 2);
                Ok(tokens.iter().filter_map(|token| token.value().copied()).sum())
            })
            .resolve(Arc::clone(&grammar))
            .unwrap();
        let num = grammar.tokens().id("NUM").unwrap();
        let plus = grammar.tokens().id("PLUS").unwrap();
        let token = |id: TokenId, value| Arc::new(ParseToken::terminal(id, value));

        let add = &grammar.productions()[1];
        let children = [token(num, Some(2)), token(plus, None), token(num, Some(5))];
        assert_eq!(callbacks.reduce(add, &children).unwrap(), Some(7));

        let pass = &grammar.productions()[2];
        assert_eq!(callbacks.reduce(pass, &[token(num, Some(4))]).unwrap(), Some(4));

        let plain = &grammar.productions()[3];
        let children = [token(plus, None), token(num, Some(9))];
        assert_eq!(callbacks.reduce(plain, &children).unwrap(), None);

        let start = &grammar.productions()[0];
        let root = Arc::new(ParseToken::reduced(grammar.start(), add.id, Vec::new(), Some(3)));
        assert_eq!(callbacks.reduce(start, &[root]).unwrap(), Some(3));
    }

    #[test]
    fn test_guard_results_are_memoised_per_round() {
        let grammar = grammar(SOURCE);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut callbacks = Bindings::<i64>::new()
            .guard("big", move |token| {
                counter.set(counter.get() + 1);
                Ok(token.value().is_some_and(|value| *value > 10))
            })
            .action("add", |_| Ok(0))
            .resolve(Arc::clone(&grammar))
            .unwrap();
        let guard = grammar.productions()[1].rhs[2].guard.unwrap();
        let num = grammar.tokens().id("NUM").unwrap();
        let token = Arc::new(ParseToken::with_value(num, 42));

        callbacks.begin_round();
        assert!(callbacks.guard(guard, &token).unwrap());
        assert!(callbacks.guard(guard, &token).unwrap());
        assert_eq!(calls.get(), 1);

        callbacks.begin_round();
        assert!(callbacks.guard(guard, &token).unwrap());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_dropped_token_does_not_leak_its_guard_result() {
        let grammar = grammar(SOURCE);
        let mut callbacks = Bindings::<i64>::new()
            .guard("big", |token| Ok(token.value().is_some_and(|value| *value > 10)))
            .action("add", |_| Ok(0))
            .resolve(Arc::clone(&grammar))
            .unwrap();
        let guard = grammar.productions()[1].rhs[2].guard.unwrap();
        let num = grammar.tokens().id("NUM").unwrap();

        callbacks.begin_round();
        let big = Arc::new(ParseToken::with_value(num, 42));
        let first = Arc::as_ptr(&big) as usize;
        assert!(callbacks.guard(guard, &big).unwrap());
        drop(big);

        // same size allocations, so a freed slot would be handed out again
        for value in 0..8 {
            let small = Arc::new(ParseToken::with_value(num, value));
            assert_ne!(Arc::as_ptr(&small) as usize, first);
            assert!(!callbacks.guard(guard, &small).unwrap());
        }
    }
}
