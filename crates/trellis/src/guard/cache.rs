//! Identifier-keyed guard interning.

use crate::error::GuardError;
use crate::guard::expr::{BoolExpr, Comparison};
use crate::guard::leaf::LeafIndexProvider;
use hashbrown::HashMap;
use std::sync::Arc;

/// Handle to an interned guard expression.
///
/// Two handles from the same cache are equal exactly when their expressions
/// have identical truth tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct GuardId(pub u32);

impl std::fmt::Display for GuardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Interns expressions by canonical identifier.
#[derive(Debug, Default)]
pub struct ExpressionCache {
    exprs: Vec<BoolExpr>,
    identifiers: Vec<Arc<str>>,
    by_identifier: HashMap<Arc<str>, GuardId, ahash::RandomState>,
}

impl ExpressionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `expr`, returning the handle of an equal expression if one exists
    pub fn intern(&mut self, expr: &BoolExpr, provider: &LeafIndexProvider) -> GuardId {
        let identifier = expr.as_identifier(provider);
        if let Some(id) = self.by_identifier.get(&identifier) {
            return *id;
        }
        #[allow(clippy::cast_possible_truncation)]
        let id = GuardId(self.exprs.len() as u32);
        self.exprs.push(expr.clone());
        self.identifiers.push(identifier.clone());
        self.by_identifier.insert(identifier, id);
        id
    }

    /// Expression behind a handle
    #[must_use]
    pub fn get(&self, id: GuardId) -> Option<&BoolExpr> {
        self.exprs.get(id.0 as usize)
    }

    /// Canonical identifier behind a handle
    #[must_use]
    pub fn identifier(&self, id: GuardId) -> Option<&str> {
        self.identifiers.get(id.0 as usize).map(AsRef::as_ref)
    }

    /// Look up a handle by canonical identifier
    #[must_use]
    pub fn find(&self, identifier: &str) -> Option<GuardId> {
        self.by_identifier.get(identifier).copied()
    }

    /// Compare two interned guards.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::MissingOperand`] if either handle is unknown.
    pub fn compare(&self, left: GuardId, right: GuardId) -> Result<Comparison, GuardError> {
        let lhs = self.get(left).ok_or(GuardError::missing_operand(left.0))?;
        let rhs = self.get(right).ok_or(GuardError::missing_operand(right.0))?;
        if left == right {
            return Ok(Comparison::Equal);
        }
        Ok(lhs.compare(rhs))
    }

    /// Scaled satisfying-row count of an interned guard.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::MissingOperand`] if the handle is unknown.
    pub fn hamming_weight(&self, id: GuardId) -> Result<u64, GuardError> {
        self.get(id)
            .map(BoolExpr::hamming_weight)
            .ok_or(GuardError::missing_operand(id.0))
    }

    /// Number of distinct guards
    #[must_use]
    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    /// Whether no guard has been interned
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    /// Iterate `(handle, expression)` pairs in interning order
    #[allow(clippy::cast_possible_truncation)]
    pub fn iter(&self) -> impl Iterator<Item = (GuardId, &BoolExpr)> {
        self.exprs
            .iter()
            .enumerate()
            .map(|(index, expr)| (GuardId(index as u32), expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_expressions_share_a_handle() {
        let mut provider = LeafIndexProvider::new();
        let a = BoolExpr::leaf("A", &mut provider).unwrap();
        let b = BoolExpr::leaf("B", &mut provider).unwrap();
        let mut cache = ExpressionCache::new();

        let first = cache.intern(&a, &provider);
        let second = cache.intern(&((&a & &b) | (&a & &!&b)), &provider);
        let third = cache.intern(&b, &provider);

        assert_eq!(first, second);
        assert_ne!(first, third);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.identifier(first), Some("A_2"));
        assert_eq!(cache.find("B_2"), Some(third));
    }

    #[test]
    fn test_compare_unknown_operand() {
        let mut provider = LeafIndexProvider::new();
        let a = BoolExpr::leaf("A", &mut provider).unwrap();
        let mut cache = ExpressionCache::new();
        let id = cache.intern(&a, &provider);

        assert_eq!(cache.compare(id, id), Ok(Comparison::Equal));
        assert_eq!(
            cache.compare(id, GuardId(5)),
            Err(GuardError::missing_operand(5))
        );
        assert!(cache.hamming_weight(GuardId(9)).is_err());
    }
}
