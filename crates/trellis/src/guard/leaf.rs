//! Guard variable registry.

use crate::error::GuardError;
use crate::guard::truth::MAX_LEAVES;
use lasso::{Key, Rodeo, Spur};

/// Ordered registry mapping guard names to stable bit indices.
///
/// Indices are handed out in registration order, starting at 0, and never
/// change. Every expression that is compared with another must have been built
/// against the same provider.
///
/// # Examples
///
/// ```
/// use trellis::guard::LeafIndexProvider;
///
/// let mut leaves = LeafIndexProvider::new();
/// assert_eq!(leaves.register("isLong").unwrap(), 0);
/// assert_eq!(leaves.register("isShort").unwrap(), 1);
/// assert_eq!(leaves.register("isLong").unwrap(), 0);
/// assert_eq!(leaves.name(1), Some("isShort"));
/// ```
#[derive(Debug, Default)]
pub struct LeafIndexProvider {
    names: Rodeo<Spur>,
}

impl LeafIndexProvider {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: Rodeo::new(),
        }
    }

    /// Return the index of `name`, registering it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::CapacityExceeded`] when `name` is new and the
    /// registry already holds the maximum number of variables.
    pub fn register(&mut self, name: &str) -> Result<u32, GuardError> {
        if let Some(key) = self.names.get(name) {
            return Ok(index_of(key));
        }
        if self.names.len() >= MAX_LEAVES {
            return Err(GuardError::capacity_exceeded(name, MAX_LEAVES));
        }
        Ok(index_of(self.names.get_or_intern(name)))
    }

    /// Index of an already registered name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<u32> {
        self.names.get(name).map(index_of)
    }

    /// Name registered at `index`
    #[must_use]
    pub fn name(&self, index: u32) -> Option<&str> {
        let key = Spur::try_from_usize(index as usize)?;
        self.names.try_resolve(&key)
    }

    /// Number of registered variables
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no variable has been registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Registered names in index order
    pub fn names(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter().map(|(key, name)| (index_of(key), name))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn index_of(key: Spur) -> u32 {
    key.into_usize() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_stable() {
        let mut leaves = LeafIndexProvider::new();
        assert_eq!(leaves.register("a"), Ok(0));
        assert_eq!(leaves.register("b"), Ok(1));
        assert_eq!(leaves.register("a"), Ok(0));
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves.get("b"), Some(1));
        assert_eq!(leaves.get("c"), None);
    }

    #[test]
    fn test_capacity_exceeded_at_63rd_name() {
        let mut leaves = LeafIndexProvider::new();
        for i in 0..MAX_LEAVES {
            assert!(leaves.register(&format!("g{i}")).is_ok());
        }
        assert_eq!(leaves.register("g0"), Ok(0));
        assert_eq!(
            leaves.register("overflow"),
            Err(GuardError::capacity_exceeded("overflow", MAX_LEAVES))
        );
    }

    #[test]
    fn test_names_in_index_order() {
        let mut leaves = LeafIndexProvider::new();
        for name in ["S", "T", "U"] {
            leaves.register(name).unwrap();
        }
        let names: Vec<_> = leaves.names().collect();
        assert_eq!(names, vec![(0, "S"), (1, "T"), (2, "U")]);
        assert_eq!(leaves.name(2), Some("U"));
        assert_eq!(leaves.name(9), None);
    }
}
