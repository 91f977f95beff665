//! Runtime tokens.

use crate::grammar::{ProductionId, TokenId, TokenMap};
use std::fmt::Write as _;
use std::sync::Arc;

/// A terminal read from the input, or a nonterminal built by a reduction.
///
/// Reduced tokens keep their children, so an accepted token is the root of a
/// parse tree. Subtrees are shared between parse branches.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseToken<V> {
    pub id: TokenId,
    pub value: Option<V>,
    pub children: Vec<Arc<ParseToken<V>>>,
    /// Production that built the token; `None` for terminals
    pub production: Option<ProductionId>,
}

impl<V> ParseToken<V> {
    /// An input terminal
    #[must_use]
    pub const fn terminal(id: TokenId, value: Option<V>) -> Self {
        Self {
            id,
            value,
            children: Vec::new(),
            production: None,
        }
    }

    /// An input terminal carrying a value
    #[must_use]
    pub const fn with_value(id: TokenId, value: V) -> Self {
        Self::terminal(id, Some(value))
    }

    /// The end-of-input marker
    #[must_use]
    pub const fn end() -> Self {
        Self::terminal(TokenId::END, None)
    }

    /// A token built by reducing `production` over `children`
    #[must_use]
    pub const fn reduced(
        id: TokenId,
        production: ProductionId,
        children: Vec<Arc<Self>>,
        value: Option<V>,
    ) -> Self {
        Self {
            id,
            value,
            children,
            production: Some(production),
        }
    }

    #[must_use]
    pub const fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.production.is_none()
    }

    /// Number of tokens in the tree rooted here
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(|child| child.size()).sum::<usize>()
    }

    /// Bracketed tree rendering: `E(E(i) PLUS E(i))`
    #[must_use]
    pub fn render(&self, tokens: &TokenMap) -> String {
        let mut out = String::new();
        self.render_into(tokens, &mut out);
        out
    }

    fn render_into(&self, tokens: &TokenMap, out: &mut String) {
        let _ = write!(out, "{}", tokens.label(self.id));
        if self.production.is_none() {
            return;
        }
        out.push('(');
        for (index, child) in self.children.iter().enumerate() {
            if index > 0 {
                out.push(' ');
            }
            child.render_into(tokens, out);
        }
        out.push(')');
    }
}
