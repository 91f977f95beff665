//! The built grammar.

use crate::grammar::production::{GrammarElement, GrammarProduction, ProductionId};
use crate::grammar::token::{TokenId, TokenMap};
use crate::guard::{BoolExpr, ExpressionCache, GuardId, LeafIndexProvider};
use compact_str::CompactString;
use hashbrown::HashMap;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// What the grammar generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum GrammarKind {
    /// An LR(1)/GLR parser
    Parser,
    /// A deterministic guarded state machine
    StateMachine,
}

impl GrammarKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parser => "parser",
            Self::StateMachine => "state machine",
        }
    }
}

/// Directives from the `options` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct GrammarOptions {
    pub namespace: Option<CompactString>,
    pub usings: Vec<CompactString>,
    pub class_name: Option<CompactString>,
}

/// A declared guard predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardDecl {
    pub name: CompactString,
    /// Bit index in the grammar's [`LeafIndexProvider`]
    pub index: u32,
    /// Inline body text, kept for documentation and table dumps
    pub body: Option<String>,
}

/// A validated, desugared grammar ready for table construction.
#[derive(Debug)]
pub struct Grammar {
    pub(crate) kind: GrammarKind,
    pub(crate) options: GrammarOptions,
    pub(crate) tokens: TokenMap,
    pub(crate) productions: Vec<GrammarProduction>,
    pub(crate) start: TokenId,
    pub(crate) leaves: LeafIndexProvider,
    pub(crate) guards: ExpressionCache,
    pub(crate) guard_decls: Vec<GuardDecl>,
    pub(crate) by_lhs: HashMap<TokenId, SmallVec<[ProductionId; 4]>, ahash::RandomState>,
    pub(crate) error_token: bool,
}

impl Grammar {
    #[must_use]
    pub const fn kind(&self) -> GrammarKind {
        self.kind
    }

    #[must_use]
    pub const fn options(&self) -> &GrammarOptions {
        &self.options
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenMap {
        &self.tokens
    }

    /// The user start symbol (initial state for a state machine)
    #[must_use]
    pub const fn start(&self) -> TokenId {
        self.start
    }

    #[must_use]
    pub fn productions(&self) -> &[GrammarProduction] {
        &self.productions
    }

    #[must_use]
    pub fn production(&self, id: ProductionId) -> Option<&GrammarProduction> {
        self.productions.get(id.index())
    }

    /// Productions whose left-hand side is `lhs`, in declaration order
    #[must_use]
    pub fn productions_for(&self, lhs: TokenId) -> &[ProductionId] {
        self.by_lhs.get(&lhs).map_or(&[][..], |ids| ids.as_slice())
    }

    #[must_use]
    pub const fn leaves(&self) -> &LeafIndexProvider {
        &self.leaves
    }

    #[must_use]
    pub const fn guards(&self) -> &ExpressionCache {
        &self.guards
    }

    #[must_use]
    pub fn guard_decls(&self) -> &[GuardDecl] {
        &self.guard_decls
    }

    #[must_use]
    pub fn guard(&self, id: GuardId) -> Option<&BoolExpr> {
        self.guards.get(id)
    }

    /// Whether `error` may appear in productions
    #[must_use]
    pub const fn error_token_support(&self) -> bool {
        self.error_token
    }

    pub(crate) fn rebuild_index(&mut self) {
        self.by_lhs.clear();
        for production in &self.productions {
            self.by_lhs
                .entry(production.lhs)
                .or_default()
                .push(production.id);
        }
    }

    /// `NAME` or `NAME[guard]`
    #[must_use]
    pub fn element_label(&self, element: GrammarElement) -> String {
        let mut label = self.tokens.label(element.token).to_string();
        if let Some(expr) = element.guard.and_then(|guard| self.guards.get(guard)) {
            let _ = write!(label, "[{}]", expr.display(&self.leaves));
        }
        label
    }

    /// `Lhs : A B C`
    #[must_use]
    pub fn production_label(&self, id: ProductionId) -> String {
        self.item_label(id, None)
    }

    /// `Lhs : A . B C`, or the plain production when `dot` is `None`
    #[must_use]
    pub fn item_label(&self, id: ProductionId, dot: Option<usize>) -> String {
        let Some(production) = self.production(id) else {
            return format!("<production {id}>");
        };
        let mut label = format!("{} :", self.tokens.label(production.lhs));
        for (position, element) in production.rhs.iter().enumerate() {
            if dot == Some(position) {
                label.push_str(" .");
            }
            label.push(' ');
            label.push_str(&self.element_label(*element));
        }
        if dot == Some(production.rhs.len()) {
            label.push_str(" .");
        }
        label
    }

    /// Every action callback name the productions use
    #[must_use]
    pub fn action_names(&self) -> BTreeSet<&str> {
        self.productions
            .iter()
            .filter_map(|production| production.action.as_ref()?.callback())
            .collect()
    }

    /// Every merge callback name the rules use
    #[must_use]
    pub fn merge_names(&self) -> BTreeSet<&str> {
        self.productions
            .iter()
            .filter_map(|production| production.merge.as_deref())
            .collect()
    }
}
