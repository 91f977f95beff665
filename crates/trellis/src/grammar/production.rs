//! Productions, guarded elements and semantic actions.

use crate::error::GrammarError;
use crate::grammar::token::TokenId;
use crate::guard::GuardId;
use compact_str::CompactString;
use smallvec::SmallVec;

/// Production number. `0` is the synthetic start production of a parser grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ProductionId(pub u32);

impl ProductionId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ProductionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token optionally qualified by a guard.
///
/// Two elements are equal when they name the same token and their guards have
/// the same truth table (guard handles are interned by truth table). An
/// unguarded element only equals another unguarded element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct GrammarElement {
    pub token: TokenId,
    pub guard: Option<GuardId>,
}

impl GrammarElement {
    #[must_use]
    pub const fn new(token: TokenId) -> Self {
        Self { token, guard: None }
    }

    #[must_use]
    pub const fn guarded(token: TokenId, guard: GuardId) -> Self {
        Self {
            token,
            guard: Some(guard),
        }
    }

    /// The end-of-input lookahead
    #[must_use]
    pub const fn end() -> Self {
        Self::new(TokenId::END)
    }
}

/// Semantic action attached to a production.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ActionSpec {
    /// `{ $N }`: the value of element `N` becomes the result
    PassThrough(usize),
    /// `{ name }` or `{ name($0, $2) }`: call a bound action
    Call {
        name: CompactString,
        /// Selected element indices; `None` passes every element
        args: Option<SmallVec<[usize; 4]>>,
    },
}

impl ActionSpec {
    /// Parse action text as written between braces.
    ///
    /// Empty text means "no action".
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::ActionSyntax`] for text that is neither a
    /// `$N` reference, a callback name, nor a callback with `$N` arguments.
    pub fn parse(text: &str, rule: &str) -> Result<Option<Self>, GrammarError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let malformed = || GrammarError::ActionSyntax {
            rule: rule.into(),
            text: text.to_string(),
        };
        if let Some(index) = text.strip_prefix('$') {
            return index
                .parse()
                .map(|index| Some(Self::PassThrough(index)))
                .map_err(|_| malformed());
        }
        let (name, args) = match text.split_once('(') {
            Some((name, rest)) => {
                let inner = rest.trim_end().strip_suffix(')').ok_or_else(malformed)?;
                let mut args = SmallVec::new();
                for arg in inner.split(',').map(str::trim).filter(|arg| !arg.is_empty()) {
                    let index = arg
                        .strip_prefix('$')
                        .and_then(|index| index.parse().ok())
                        .ok_or_else(malformed)?;
                    args.push(index);
                }
                (name.trim(), Some(args))
            }
            None => (text, None),
        };
        let valid_name = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(malformed());
        }
        Ok(Some(Self::Call {
            name: name.into(),
            args,
        }))
    }

    /// Callback name, if the action calls one
    #[must_use]
    pub fn callback(&self) -> Option<&str> {
        match self {
            Self::PassThrough(_) => None,
            Self::Call { name, .. } => Some(name.as_str()),
        }
    }

    /// Highest element index the action refers to
    #[must_use]
    pub fn max_index(&self) -> Option<usize> {
        match self {
            Self::PassThrough(index) => Some(*index),
            Self::Call { args, .. } => args.as_ref().and_then(|args| args.iter().max().copied()),
        }
    }
}

impl std::fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PassThrough(index) => write!(f, "${index}"),
            Self::Call { name, args: None } => f.write_str(name),
            Self::Call {
                name,
                args: Some(args),
            } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "${arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// One alternative of a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct GrammarProduction {
    pub id: ProductionId,
    pub lhs: TokenId,
    pub rhs: SmallVec<[GrammarElement; 4]>,
    pub action: Option<ActionSpec>,
    /// Merge callback of the owning rule
    pub merge: Option<CompactString>,
}

impl GrammarProduction {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rhs.len()
    }

    /// Whether the production derives the empty string directly
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rhs.is_empty()
    }
}
