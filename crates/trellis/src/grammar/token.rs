//! Grammar tokens and the name/id map.

use compact_str::CompactString;
use hashbrown::HashMap;

/// Numeric token id.
///
/// Terminals live below [`TokenId::FIRST_NONTERMINAL`]; `0` is end of input
/// and `1` is the error token. Nonterminals are allocated upward from
/// [`TokenId::FIRST_NONTERMINAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TokenId(pub u32);

impl TokenId {
    /// End of input
    pub const END: Self = Self(0);
    /// The error token used for recovery
    pub const ERROR: Self = Self(1);
    /// First id handed to user terminals without an explicit id
    pub const FIRST_TERMINAL: u32 = 2;
    /// First nonterminal id
    pub const FIRST_NONTERMINAL: u32 = 0x1_0000;

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.0 < Self::FIRST_NONTERMINAL
    }

    #[must_use]
    pub const fn is_nonterminal(self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Repetition suffix on a grammar element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Multiplicity {
    #[default]
    One,
    /// `X?`
    ZeroOrOne,
    /// `X*`
    ZeroToMany,
    /// `X+`
    OneToMany,
}

impl Multiplicity {
    /// Parse a suffix character
    #[must_use]
    pub const fn from_suffix(suffix: char) -> Option<Self> {
        match suffix {
            '?' => Some(Self::ZeroOrOne),
            '*' => Some(Self::ZeroToMany),
            '+' => Some(Self::OneToMany),
            _ => None,
        }
    }

    /// Name prefix of the helper nonterminal that implements the repetition
    #[must_use]
    pub const fn helper_prefix(self) -> &'static str {
        match self {
            Self::One => "",
            Self::ZeroOrOne => "zeroOrOne",
            Self::ZeroToMany => "zeroToMany",
            Self::OneToMany => "oneToMany",
        }
    }

    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::One => "",
            Self::ZeroOrOne => "?",
            Self::ZeroToMany => "*",
            Self::OneToMany => "+",
        }
    }
}

/// A declared or synthesized grammar symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct GrammarToken {
    pub id: TokenId,
    pub name: CompactString,
    /// Declared semantic value type, kept as text
    pub value_type: Option<CompactString>,
    /// Repetition implemented by this symbol, for helper nonterminals
    pub multiplicity: Multiplicity,
}

impl GrammarToken {
    #[must_use]
    pub fn new(id: TokenId, name: &str) -> Self {
        Self {
            id,
            name: CompactString::from(name),
            value_type: None,
            multiplicity: Multiplicity::One,
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.id.is_terminal()
    }

    /// Whether the symbol was synthesized for a repetition suffix
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.multiplicity != Multiplicity::One
    }
}

/// Bidirectional map between token names and ids.
///
/// A parser hands this to its tokeniser so that token kinds can be looked up
/// by the names used in the grammar.
#[derive(Debug, Clone, Default)]
pub struct TokenMap {
    tokens: HashMap<TokenId, GrammarToken, ahash::RandomState>,
    by_name: HashMap<CompactString, TokenId, ahash::RandomState>,
    order: Vec<TokenId>,
}

impl TokenMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a token; returns `false` if the name or the id is taken
    pub fn insert(&mut self, token: GrammarToken) -> bool {
        if self.by_name.contains_key(&token.name) || self.tokens.contains_key(&token.id) {
            return false;
        }
        self.by_name.insert(token.name.clone(), token.id);
        self.order.push(token.id);
        self.tokens.insert(token.id, token);
        true
    }

    /// Id of a named token
    #[must_use]
    pub fn id(&self, name: &str) -> Option<TokenId> {
        self.by_name.get(name).copied()
    }

    /// Name of a token id
    #[must_use]
    pub fn name(&self, id: TokenId) -> Option<&str> {
        self.tokens.get(&id).map(|token| token.name.as_str())
    }

    #[must_use]
    pub fn get(&self, id: TokenId) -> Option<&GrammarToken> {
        self.tokens.get(&id)
    }

    #[must_use]
    pub fn contains(&self, id: TokenId) -> bool {
        self.tokens.contains_key(&id)
    }

    /// Tokens in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &GrammarToken> {
        self.order.iter().filter_map(|id| self.tokens.get(id))
    }

    pub fn terminals(&self) -> impl Iterator<Item = &GrammarToken> {
        self.iter().filter(|token| token.is_terminal())
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = &GrammarToken> {
        self.iter().filter(|token| !token.is_terminal())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Display name of a token, falling back to its numeric id
    #[must_use]
    pub fn label(&self, id: TokenId) -> CompactString {
        self.name(id)
            .map_or_else(|| compact_str::format_compact!("{id}"), CompactString::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_ranges() {
        assert!(TokenId::END.is_terminal());
        assert!(TokenId::ERROR.is_terminal());
        assert!(TokenId(TokenId::FIRST_NONTERMINAL).is_nonterminal());
    }

    #[test]
    fn test_token_map_is_bidirectional() {
        let mut map = TokenMap::new();
        assert!(map.insert(GrammarToken::new(TokenId(2), "PLUS")));
        assert!(map.insert(GrammarToken::new(TokenId(0x1_0000), "Expr")));
        assert!(!map.insert(GrammarToken::new(TokenId(3), "PLUS")));
        assert!(!map.insert(GrammarToken::new(TokenId(2), "MINUS")));

        assert_eq!(map.id("PLUS"), Some(TokenId(2)));
        assert_eq!(map.name(TokenId(0x1_0000)), Some("Expr"));
        assert_eq!(map.terminals().count(), 1);
        assert_eq!(map.nonterminals().count(), 1);
        assert_eq!(map.label(TokenId(99)), "#99");
    }

    #[test]
    fn test_multiplicity_suffixes() {
        assert_eq!(Multiplicity::from_suffix('*'), Some(Multiplicity::ZeroToMany));
        assert_eq!(Multiplicity::from_suffix('x'), None);
        assert_eq!(Multiplicity::OneToMany.helper_prefix(), "oneToMany");
        assert_eq!(Multiplicity::ZeroOrOne.suffix(), "?");
    }
}
