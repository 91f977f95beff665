//! Grammar construction.
//!
//! [`GrammarBuilder`] holds a grammar as written (by the DSL reader or by hand)
//! and turns it into a [`Grammar`]: token ids are assigned, guard expressions
//! are resolved and interned, repetition suffixes are desugared into helper
//! rules, and every problem found on the way is collected as a
//! [`GrammarError`].

use crate::error::{GrammarError, GuardError, SourcePos};
use crate::grammar::desugar::Desugarer;
use crate::grammar::model::{Grammar, GrammarKind, GrammarOptions, GuardDecl};
use crate::grammar::production::{ActionSpec, GrammarElement, GrammarProduction, ProductionId};
use crate::grammar::token::{GrammarToken, Multiplicity, TokenId, TokenMap};
use crate::grammar::validate;
use crate::guard::{BoolExpr, ExpressionCache, LeafIndexProvider};
use compact_str::CompactString;
use hashbrown::HashSet;
use smallvec::SmallVec;

/// Name of the synthetic start symbol of a parser grammar.
pub const ACCEPT_SYMBOL: &str = "$accept";

/// A guard expression as written, before names are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardAst {
    Name(CompactString),
    Not(Box<GuardAst>),
    And(Box<GuardAst>, Box<GuardAst>),
    Or(Box<GuardAst>, Box<GuardAst>),
}

impl GuardAst {
    #[must_use]
    pub fn name(name: &str) -> Self {
        Self::Name(name.into())
    }

    /// Resolve names against declared guards.
    ///
    /// Returns the first undeclared name on failure.
    pub fn resolve(&self, leaves: &LeafIndexProvider) -> Result<BoolExpr, CompactString> {
        Ok(match self {
            Self::Name(name) => BoolExpr::leaf_index(leaves.get(name).ok_or_else(|| name.clone())?),
            Self::Not(inner) => inner.resolve(leaves)?.negate(),
            Self::And(left, right) => left.resolve(leaves)?.and(&right.resolve(leaves)?),
            Self::Or(left, right) => left.resolve(leaves)?.or(&right.resolve(leaves)?),
        })
    }
}

/// An element as written: `NAME`, `NAME?`, `NAME*[guard]`, ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub name: CompactString,
    pub multiplicity: Multiplicity,
    pub guard: Option<GuardAst>,
}

impl ElementSpec {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            multiplicity: Multiplicity::One,
            guard: None,
        }
    }

    #[must_use]
    pub const fn with_multiplicity(mut self, multiplicity: Multiplicity) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    #[must_use]
    pub fn with_guard(mut self, guard: GuardAst) -> Self {
        self.guard = Some(guard);
        self
    }
}

/// One alternative of a rule as written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlternativeSpec {
    pub elements: Vec<ElementSpec>,
    /// Action text between the braces
    pub action: Option<String>,
}

impl AlternativeSpec {
    #[must_use]
    pub fn new(elements: impl IntoIterator<Item = ElementSpec>) -> Self {
        Self {
            elements: elements.into_iter().collect(),
            action: None,
        }
    }

    /// Alternative of plain, unguarded elements
    #[must_use]
    pub fn of(names: &[&str]) -> Self {
        Self::new(names.iter().map(|name| ElementSpec::new(name)))
    }

    #[must_use]
    pub fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }
}

/// A rule (parser) or a state (state machine) as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub name: CompactString,
    pub alternatives: Vec<AlternativeSpec>,
    pub merge: Option<CompactString>,
    pub pos: SourcePos,
}

impl RuleSpec {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            alternatives: Vec::new(),
            merge: None,
            pos: SourcePos::default(),
        }
    }

    #[must_use]
    pub fn alternative(mut self, alternative: AlternativeSpec) -> Self {
        self.alternatives.push(alternative);
        self
    }

    #[must_use]
    pub fn with_merge(mut self, merge: &str) -> Self {
        self.merge = Some(merge.into());
        self
    }
}

/// A terminal (event) declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    pub name: CompactString,
    pub value_type: Option<CompactString>,
    pub id: Option<u32>,
}

impl EventSpec {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            value_type: None,
            id: None,
        }
    }
}

/// A guard declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardSpec {
    pub name: CompactString,
    pub body: Option<String>,
}

/// A grammar as written.
///
/// # Examples
///
/// ```
/// use trellis::grammar::{AlternativeSpec, GrammarBuilder, RuleSpec};
///
/// let (grammar, diagnostics) = GrammarBuilder::parser("E")
///     .event("i")
///     .event("PLUS")
///     .rule(
///         RuleSpec::new("E")
///             .alternative(AlternativeSpec::of(&["E", "PLUS", "i"]))
///             .alternative(AlternativeSpec::of(&["i"])),
///     )
///     .build(false)
///     .unwrap();
///
/// assert!(diagnostics.is_empty());
/// // production 0 is `$accept : E`
/// assert_eq!(grammar.productions().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarBuilder {
    pub kind: GrammarKind,
    pub options: GrammarOptions,
    pub events: Vec<EventSpec>,
    pub guards: Vec<GuardSpec>,
    pub start: CompactString,
    pub rules: Vec<RuleSpec>,
}

/// Mutable state shared by the build steps.
pub(crate) struct BuildState {
    pub(crate) tokens: TokenMap,
    pub(crate) productions: Vec<GrammarProduction>,
    pub(crate) leaves: LeafIndexProvider,
    pub(crate) guards: ExpressionCache,
    next_nonterminal: u32,
}

impl BuildState {
    pub(crate) fn add_nonterminal(
        &mut self,
        name: &str,
        multiplicity: Multiplicity,
    ) -> Option<TokenId> {
        let id = TokenId(self.next_nonterminal);
        let mut token = GrammarToken::new(id, name);
        token.multiplicity = multiplicity;
        if !self.tokens.insert(token) {
            return None;
        }
        self.next_nonterminal += 1;
        Some(id)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn push_production(
        &mut self,
        lhs: TokenId,
        rhs: SmallVec<[GrammarElement; 4]>,
        action: Option<ActionSpec>,
        merge: Option<CompactString>,
    ) -> ProductionId {
        let id = ProductionId(self.productions.len() as u32);
        self.productions.push(GrammarProduction {
            id,
            lhs,
            rhs,
            action,
            merge,
        });
        id
    }
}

impl GrammarBuilder {
    /// Start a parser grammar with the given start rule
    #[must_use]
    pub fn parser(start: &str) -> Self {
        Self::with_kind(GrammarKind::Parser, start)
    }

    /// Start a state machine with the given initial state
    #[must_use]
    pub fn state_machine(start: &str) -> Self {
        Self::with_kind(GrammarKind::StateMachine, start)
    }

    #[must_use]
    pub fn with_kind(kind: GrammarKind, start: &str) -> Self {
        Self {
            kind,
            options: GrammarOptions::default(),
            events: Vec::new(),
            guards: Vec::new(),
            start: start.into(),
            rules: Vec::new(),
        }
    }

    /// Declare a terminal with an automatically assigned id
    #[must_use]
    pub fn event(mut self, name: &str) -> Self {
        self.events.push(EventSpec::new(name));
        self
    }

    /// Declare a guard predicate
    #[must_use]
    pub fn guard(mut self, name: &str) -> Self {
        self.guards.push(GuardSpec {
            name: name.into(),
            body: None,
        });
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: RuleSpec) -> Self {
        self.rules.push(rule);
        self
    }

    /// Build the grammar.
    ///
    /// Problems in the grammar are returned as diagnostics next to a grammar
    /// containing everything that could be resolved; the grammar must not be
    /// used for table construction when diagnostics are present.
    ///
    /// # Errors
    ///
    /// Fails only when more guards are declared than fit in a guard
    /// expression.
    #[allow(clippy::too_many_lines)]
    pub fn build(
        self,
        error_token_support: bool,
    ) -> Result<(Grammar, Vec<GrammarError>), GuardError> {
        let mut diagnostics = Vec::new();
        let mut state = BuildState {
            tokens: TokenMap::new(),
            productions: Vec::new(),
            leaves: LeafIndexProvider::new(),
            guards: ExpressionCache::new(),
            next_nonterminal: TokenId::FIRST_NONTERMINAL,
        };

        state.tokens.insert(GrammarToken::new(TokenId::END, "$end"));
        if error_token_support {
            state.tokens.insert(GrammarToken::new(TokenId::ERROR, "error"));
        }

        // Terminals: explicit ids first claim their numbers.
        let explicit: HashSet<u32> = self.events.iter().filter_map(|event| event.id).collect();
        let mut next_terminal = TokenId::FIRST_TERMINAL;
        for event in &self.events {
            let id = event.id.unwrap_or_else(|| {
                while explicit.contains(&next_terminal) {
                    next_terminal += 1;
                }
                next_terminal += 1;
                next_terminal - 1
            });
            if id < TokenId::FIRST_TERMINAL || id >= TokenId::FIRST_NONTERMINAL {
                diagnostics.push(GrammarError::InvalidTokenId {
                    name: event.name.clone(),
                    id,
                });
                continue;
            }
            let mut token = GrammarToken::new(TokenId(id), &event.name);
            token.value_type.clone_from(&event.value_type);
            if !state.tokens.insert(token) {
                diagnostics.push(if state.tokens.id(&event.name).is_some() {
                    GrammarError::duplicate(&event.name)
                } else {
                    GrammarError::InvalidTokenId {
                        name: event.name.clone(),
                        id,
                    }
                });
            }
        }

        let mut guard_decls: Vec<GuardDecl> = Vec::new();
        for guard in &self.guards {
            if guard_decls.iter().any(|decl| decl.name == guard.name) {
                diagnostics.push(GrammarError::duplicate(&guard.name));
                continue;
            }
            let index = state.leaves.register(&guard.name)?;
            guard_decls.push(GuardDecl {
                name: guard.name.clone(),
                index,
                body: guard.body.clone(),
            });
        }

        let accept = if self.kind == GrammarKind::Parser {
            state.add_nonterminal(ACCEPT_SYMBOL, Multiplicity::One)
        } else {
            None
        };
        for rule in &self.rules {
            if state.add_nonterminal(&rule.name, Multiplicity::One).is_none() {
                diagnostics.push(GrammarError::duplicate(&rule.name));
            }
        }

        let start = match state.tokens.id(&self.start) {
            Some(id) if id.is_nonterminal() && Some(id) != accept => id,
            _ => {
                diagnostics.push(GrammarError::UndefinedStart {
                    name: self.start.clone(),
                });
                TokenId(TokenId::FIRST_NONTERMINAL)
            }
        };
        if let Some(accept) = accept {
            state.push_production(
                accept,
                SmallVec::from_iter([GrammarElement::new(start)]),
                None,
                None,
            );
        }

        let mut desugarer = Desugarer::default();
        let mut defined_rules: HashSet<&str> = HashSet::new();
        for rule in &self.rules {
            // a duplicated rule name was already reported
            if !defined_rules.insert(rule.name.as_str()) {
                continue;
            }
            let Some(lhs) = state.tokens.id(&rule.name) else {
                continue;
            };
            for alternative in &rule.alternatives {
                let mut rhs = SmallVec::new();
                let mut complete = true;
                for spec in &alternative.elements {
                    match self.resolve_element(&mut state, &mut desugarer, spec, &rule.name) {
                        Ok(element) => rhs.push(element),
                        Err(error) => {
                            diagnostics.push(error);
                            complete = false;
                        }
                    }
                }
                let parsed = alternative
                    .action
                    .as_deref()
                    .map(|text| ActionSpec::parse(text, &rule.name));
                let action = match parsed {
                    Some(Ok(action)) => action,
                    Some(Err(error)) => {
                        diagnostics.push(error);
                        complete = false;
                        None
                    }
                    None => None,
                };
                if complete {
                    state.push_production(lhs, rhs, action, rule.merge.clone());
                }
            }
        }

        let mut grammar = Grammar {
            kind: self.kind,
            options: self.options,
            tokens: state.tokens,
            productions: state.productions,
            start,
            leaves: state.leaves,
            guards: state.guards,
            guard_decls,
            by_lhs: hashbrown::HashMap::default(),
            error_token: error_token_support,
        };
        grammar.rebuild_index();
        validate::validate(&grammar, &mut diagnostics);

        tracing::debug!(
            kind = grammar.kind.as_str(),
            tokens = grammar.tokens.len(),
            productions = grammar.productions.len(),
            guards = grammar.guards.len(),
            diagnostics = diagnostics.len(),
            "built grammar"
        );
        Ok((grammar, diagnostics))
    }

    fn resolve_element(
        &self,
        state: &mut BuildState,
        desugarer: &mut Desugarer,
        spec: &ElementSpec,
        rule: &str,
    ) -> Result<GrammarElement, GrammarError> {
        let token = state
            .tokens
            .id(&spec.name)
            .filter(|id| *id != TokenId::END && state.tokens.name(*id) != Some(ACCEPT_SYMBOL))
            .ok_or_else(|| GrammarError::undefined_symbol(&spec.name, rule))?;
        let guard = match &spec.guard {
            Some(ast) => {
                let expr = ast
                    .resolve(&state.leaves)
                    .map_err(|name| GrammarError::undefined_guard(&name, rule))?;
                Some(state.guards.intern(&expr, &state.leaves))
            }
            None => None,
        };
        let element = GrammarElement { token, guard };
        if spec.multiplicity == Multiplicity::One {
            return Ok(element);
        }
        if self.kind == GrammarKind::StateMachine {
            return Err(GrammarError::InvalidTransition {
                state: rule.into(),
                message: format!(
                    "repetition '{}{}' is not allowed in a state machine",
                    spec.name,
                    spec.multiplicity.suffix()
                ),
            });
        }
        Ok(desugarer.expand(state, element, spec.multiplicity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(builder: GrammarBuilder) -> (Grammar, Vec<GrammarError>) {
        builder.build(false).unwrap()
    }

    fn labels(grammar: &Grammar) -> Vec<String> {
        grammar
            .productions()
            .iter()
            .map(|production| grammar.production_label(production.id))
            .collect()
    }

    #[test]
    fn test_token_ids() {
        let mut builder = GrammarBuilder::parser("S").event("A").event("B");
        builder.events.push(EventSpec {
            id: Some(2),
            ..EventSpec::new("FIRST")
        });
        let rule = RuleSpec::new("S").alternative(AlternativeSpec::of(&["A"]));
        let (grammar, diagnostics) = build(builder.rule(rule));
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        let tokens = grammar.tokens();
        assert_eq!(tokens.id("FIRST"), Some(TokenId(2)));
        assert_eq!(tokens.id("A"), Some(TokenId(3)));
        assert_eq!(tokens.id("B"), Some(TokenId(4)));
        assert_eq!(tokens.id("$accept"), Some(TokenId(0x1_0000)));
        assert_eq!(tokens.id("S"), Some(TokenId(0x1_0001)));
        assert_eq!(tokens.id("error"), None);
    }

    #[test]
    fn test_reserved_and_duplicate_ids() {
        let mut builder = GrammarBuilder::parser("S").event("A").event("A");
        builder.events.push(EventSpec {
            id: Some(1),
            ..EventSpec::new("BAD")
        });
        let rule = RuleSpec::new("S").alternative(AlternativeSpec::of(&["A"]));
        let (_, diagnostics) = build(builder.rule(rule));
        assert!(diagnostics.contains(&GrammarError::duplicate("A")));
        assert!(diagnostics.contains(&GrammarError::InvalidTokenId {
            name: "BAD".into(),
            id: 1
        }));
    }

    #[test]
    fn test_start_production_is_first() {
        let (grammar, diagnostics) = build(
            GrammarBuilder::parser("S")
                .event("A")
                .rule(RuleSpec::new("S").alternative(AlternativeSpec::of(&["A"]))),
        );
        assert!(diagnostics.is_empty());
        assert_eq!(labels(&grammar), vec!["$accept : S", "S : A"]);
    }

    #[test]
    fn test_optional_element_desugars_ahead_of_rule() {
        let (grammar, diagnostics) = build(
            GrammarBuilder::parser("List")
                .event("item")
                .event("END")
                .rule(RuleSpec::new("List").alternative(AlternativeSpec::new([
                    ElementSpec::new("item").with_multiplicity(Multiplicity::ZeroOrOne),
                    ElementSpec::new("END"),
                ]))),
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(
            labels(&grammar),
            vec![
                "$accept : List",
                "zeroOrOne_item : item",
                "zeroOrOne_item :",
                "List : zeroOrOne_item END",
            ]
        );
        let helper = grammar.tokens().id("zeroOrOne_item").unwrap();
        assert_eq!(
            grammar.tokens().get(helper).unwrap().multiplicity,
            Multiplicity::ZeroOrOne
        );
    }

    #[test]
    fn test_repetitions_reuse_helpers() {
        let (grammar, diagnostics) = build(
            GrammarBuilder::parser("S")
                .event("x")
                .rule(
                    RuleSpec::new("S")
                        .alternative(AlternativeSpec::new([
                            ElementSpec::new("x").with_multiplicity(Multiplicity::ZeroToMany)
                        ]))
                        .alternative(AlternativeSpec::new([
                            ElementSpec::new("x").with_multiplicity(Multiplicity::OneToMany),
                            ElementSpec::new("x").with_multiplicity(Multiplicity::ZeroToMany),
                        ])),
                ),
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(
            labels(&grammar),
            vec![
                "$accept : S",
                "zeroToMany_x : zeroToMany_x x",
                "zeroToMany_x :",
                "S : zeroToMany_x",
                "oneToMany_x : oneToMany_x x",
                "oneToMany_x : x",
                "S : oneToMany_x zeroToMany_x",
            ]
        );
    }

    #[test]
    fn test_guard_moves_onto_repeated_element() {
        let (grammar, diagnostics) = build(
            GrammarBuilder::parser("S")
                .event("item")
                .guard("isLong")
                .rule(RuleSpec::new("S").alternative(AlternativeSpec::new([ElementSpec::new("item")
                    .with_multiplicity(Multiplicity::ZeroOrOne)
                    .with_guard(GuardAst::name("isLong"))]))),
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(
            labels(&grammar),
            vec![
                "$accept : S",
                "zeroOrOne_item_isLong_2 : item[isLong]",
                "zeroOrOne_item_isLong_2 :",
                "S : zeroOrOne_item_isLong_2",
            ]
        );
        let reference = grammar.productions()[3].rhs[0];
        assert_eq!(reference.guard, None);
        assert!(grammar.productions()[1].rhs[0].guard.is_some());
    }

    #[test]
    fn test_undefined_references() {
        let (_, diagnostics) = build(
            GrammarBuilder::parser("S").event("A").rule(
                RuleSpec::new("S").alternative(AlternativeSpec::new([
                    ElementSpec::new("Missing"),
                    ElementSpec::new("A").with_guard(GuardAst::name("nope")),
                ])),
            ),
        );
        assert_eq!(
            diagnostics,
            vec![
                GrammarError::undefined_symbol("Missing", "S"),
                GrammarError::undefined_guard("nope", "S"),
            ]
        );
    }

    #[test]
    fn test_undefined_start() {
        let (_, diagnostics) = build(
            GrammarBuilder::parser("Nope")
                .event("A")
                .rule(RuleSpec::new("S").alternative(AlternativeSpec::of(&["A"]))),
        );
        assert_eq!(
            diagnostics.first(),
            Some(&GrammarError::UndefinedStart { name: "Nope".into() })
        );
    }

    #[test]
    fn test_error_token_requires_support() {
        let grammar = || {
            GrammarBuilder::parser("S")
                .event("A")
                .rule(RuleSpec::new("S").alternative(AlternativeSpec::of(&["error", "A"])))
        };
        let (_, without) = grammar().build(false).unwrap();
        assert_eq!(without, vec![GrammarError::undefined_symbol("error", "S")]);
        let (with_support, diagnostics) = grammar().build(true).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(with_support.tokens().id("error"), Some(TokenId::ERROR));
    }

    #[test]
    fn test_too_many_guards_is_a_hard_error() {
        let mut builder = GrammarBuilder::parser("S");
        for i in 0..=crate::guard::MAX_LEAVES {
            builder = builder.guard(&format!("g{i}"));
        }
        assert!(matches!(
            builder.build(false),
            Err(GuardError::CapacityExceeded { .. })
        ));
    }
}
