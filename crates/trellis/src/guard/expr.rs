//! Boolean guard expressions.

use crate::guard::leaf::LeafIndexProvider;
use crate::guard::truth::{
    BLOCK_BITS, BlockWalk, LOW_PATTERNS, block_mask, deposit_bits, leaf_block, set_bits,
};
use hashbrown::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

/// Node shape of a guard expression.
#[derive(Debug)]
pub enum ExprKind {
    Leaf(u32),
    Not(BoolExpr),
    And(BoolExpr, BoolExpr),
    Or(BoolExpr, BoolExpr),
}

#[derive(Debug)]
struct ExprNode {
    kind: ExprKind,
    leaves: u64,
    minimised: OnceLock<u64>,
    weight: OnceLock<u64>,
    identifier: OnceLock<Arc<str>>,
}

/// Result of comparing the truth tables of two expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    /// Some rows satisfy both, and each side has rows of its own
    Intersect,
    /// Every row satisfying the left also satisfies the right
    LeftSubsetOfRight,
    /// Every row satisfying the right also satisfies the left
    RightSubsetOfLeft,
    Equal,
    /// No row satisfies both
    Disjoint,
    /// The expressions share no variables
    Independent,
}

impl Comparison {
    /// The comparison seen from the other operand
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::LeftSubsetOfRight => Self::RightSubsetOfLeft,
            Self::RightSubsetOfLeft => Self::LeftSubsetOfRight,
            other => other,
        }
    }

    /// Whether both expressions can hold for some assignment
    #[must_use]
    pub const fn may_overlap(self) -> bool {
        !matches!(self, Self::Disjoint)
    }
}

/// An immutable boolean expression over named guard variables.
///
/// Expressions are compared by truth table, not by shape: `A & B | A & !B`
/// equals `A`. Cloning is cheap, subexpressions are shared.
///
/// The canonical identifier ([`BoolExpr::as_identifier`]) is derived from the
/// minimised variable set and the truth table over those variables, so two
/// semantically equal expressions always produce the same string. Containers
/// key guards by that identifier instead of hashing the tree.
///
/// # Examples
///
/// ```
/// use trellis::guard::{BoolExpr, LeafIndexProvider};
///
/// let mut leaves = LeafIndexProvider::new();
/// let a = BoolExpr::leaf("A", &mut leaves).unwrap();
/// let b = BoolExpr::leaf("B", &mut leaves).unwrap();
///
/// let redundant = (&a & &b) | (&a & &!&b);
/// assert_eq!(redundant, a);
/// assert_eq!(&*redundant.as_identifier(&leaves), "A_2");
/// ```
#[derive(Debug, Clone)]
pub struct BoolExpr(Arc<ExprNode>);

impl BoolExpr {
    fn from_kind(kind: ExprKind) -> Self {
        let leaves = match &kind {
            ExprKind::Leaf(index) => 1u64 << index,
            ExprKind::Not(inner) => inner.leaves(),
            ExprKind::And(left, right) | ExprKind::Or(left, right) => {
                left.leaves() | right.leaves()
            }
        };
        Self(Arc::new(ExprNode {
            kind,
            leaves,
            minimised: OnceLock::new(),
            weight: OnceLock::new(),
            identifier: OnceLock::new(),
        }))
    }

    /// A single guard variable, registering `name` with the provider.
    ///
    /// # Errors
    ///
    /// Fails when the provider is already full.
    pub fn leaf(name: &str, provider: &mut LeafIndexProvider) -> Result<Self, crate::GuardError> {
        provider.register(name).map(Self::leaf_index)
    }

    /// A single guard variable by its registered index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below [`MAX_LEAVES`](crate::guard::MAX_LEAVES).
    #[must_use]
    pub fn leaf_index(index: u32) -> Self {
        assert!(
            (index as usize) < crate::guard::MAX_LEAVES,
            "guard variable index {index} out of range"
        );
        Self::from_kind(ExprKind::Leaf(index))
    }

    /// Logical negation
    #[must_use]
    pub fn negate(&self) -> Self {
        Self::from_kind(ExprKind::Not(self.clone()))
    }

    /// Logical conjunction
    #[must_use]
    pub fn and(&self, other: &Self) -> Self {
        Self::from_kind(ExprKind::And(self.clone(), other.clone()))
    }

    /// Logical disjunction
    #[must_use]
    pub fn or(&self, other: &Self) -> Self {
        Self::from_kind(ExprKind::Or(self.clone(), other.clone()))
    }

    /// Node shape
    #[must_use]
    pub fn kind(&self) -> &ExprKind {
        &self.0.kind
    }

    /// Bit mask of every variable mentioned in the expression
    #[must_use]
    pub fn leaves(&self) -> u64 {
        self.0.leaves
    }

    /// Truth bits of the 64 rows in `block`.
    ///
    /// Row `r` of block `b` assigns variable `i < 6` the bit `i` of `r`, and
    /// variable `i >= 6` the bit `i - 6` of `b`.
    #[must_use]
    pub fn result_bits(&self, block: u64) -> u64 {
        match &self.0.kind {
            ExprKind::Leaf(index) => leaf_block(*index, block),
            ExprKind::Not(inner) => !inner.result_bits(block),
            ExprKind::And(left, right) => left.result_bits(block) & right.result_bits(block),
            ExprKind::Or(left, right) => left.result_bits(block) | right.result_bits(block),
        }
    }

    /// Compare the truth tables of two expressions.
    ///
    /// Expressions with no variable in common are reported as
    /// [`Comparison::Independent`] without looking at their tables.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Comparison {
        if self.leaves() & other.leaves() == 0 {
            return Comparison::Independent;
        }
        let mask = block_mask(self.leaves() | other.leaves());
        let (mut both, mut left_only, mut right_only) = (0u64, 0u64, 0u64);
        for block in BlockWalk::new(mask) {
            let left = self.result_bits(block);
            let right = other.result_bits(block);
            both |= left & right;
            left_only |= left & !right;
            right_only |= !left & right;
            if both != 0 && left_only != 0 && right_only != 0 {
                break;
            }
        }
        match (both != 0, left_only != 0, right_only != 0) {
            (_, false, false) => Comparison::Equal,
            (false, _, _) => Comparison::Disjoint,
            (true, false, true) => Comparison::LeftSubsetOfRight,
            (true, true, false) => Comparison::RightSubsetOfLeft,
            (true, true, true) => Comparison::Intersect,
        }
    }

    /// Variables that actually influence the result.
    #[must_use]
    pub fn minimised_leaves(&self) -> u64 {
        *self.0.minimised.get_or_init(|| self.compute_minimised())
    }

    fn compute_minimised(&self) -> u64 {
        let leaves = self.leaves();
        let blocks = block_mask(leaves);
        let mut minimised = leaves;
        for index in set_bits(leaves) {
            let irrelevant = if index < BLOCK_BITS {
                let shift = 1u32 << index;
                let low_rows = !LOW_PATTERNS[index as usize];
                BlockWalk::new(blocks).all(|block| {
                    let bits = self.result_bits(block);
                    ((bits >> shift) ^ bits) & low_rows == 0
                })
            } else {
                let selector = 1u64 << (index - BLOCK_BITS);
                BlockWalk::new(blocks & !selector)
                    .all(|block| self.result_bits(block) == self.result_bits(block | selector))
            };
            if irrelevant {
                minimised &= !(1u64 << index);
            }
        }
        minimised
    }

    /// Number of satisfying rows, scaled to the full 2^62-row space.
    ///
    /// Expressions over different variable sets compare directly; a strict
    /// subset always weighs strictly less.
    #[must_use]
    pub fn hamming_weight(&self) -> u64 {
        *self.0.weight.get_or_init(|| {
            let blocks = block_mask(self.leaves());
            let count: u64 = BlockWalk::new(blocks)
                .map(|block| u64::from(self.result_bits(block).count_ones()))
                .sum();
            count << (56 - blocks.count_ones())
        })
    }

    /// Evaluate with a fallible variable lookup, short-circuiting `&` and `|`.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `leaf_value`.
    pub fn evaluate<E>(
        &self,
        leaf_value: &mut impl FnMut(u32) -> Result<bool, E>,
    ) -> Result<bool, E> {
        match &self.0.kind {
            ExprKind::Leaf(index) => leaf_value(*index),
            ExprKind::Not(inner) => Ok(!inner.evaluate(leaf_value)?),
            ExprKind::And(left, right) => {
                Ok(left.evaluate(leaf_value)? && right.evaluate(leaf_value)?)
            }
            ExprKind::Or(left, right) => {
                Ok(left.evaluate(leaf_value)? || right.evaluate(leaf_value)?)
            }
        }
    }

    /// Canonical identifier, cached after the first call.
    ///
    /// Minimised variable names in registration order joined by `_`, then `_`
    /// and the truth table over exactly those variables as hex, highest row
    /// first. Constant expressions are a single hex digit.
    #[must_use]
    pub fn as_identifier(&self, provider: &LeafIndexProvider) -> Arc<str> {
        self.0
            .identifier
            .get_or_init(|| Arc::from(self.compute_identifier(provider)))
            .clone()
    }

    /// Cached identifier, if [`BoolExpr::as_identifier`] has run
    #[must_use]
    pub fn cached_identifier(&self) -> Option<&str> {
        self.0.identifier.get().map(AsRef::as_ref)
    }

    fn compute_identifier(&self, provider: &LeafIndexProvider) -> String {
        let minimised = self.minimised_leaves();
        let mut identifier = String::new();
        for index in set_bits(minimised) {
            identifier.push_str(provider.name(index).unwrap_or("?"));
            identifier.push('_');
        }

        let variables = minimised.count_ones();
        let rows_per_word = if variables >= BLOCK_BITS {
            64
        } else {
            1u64 << variables
        };
        let words = if variables >= BLOCK_BITS {
            1u64 << (variables - BLOCK_BITS)
        } else {
            1
        };
        let digits = usize::try_from(rows_per_word.div_ceil(4)).unwrap_or(16);

        let mut block_cache: HashMap<u64, u64> = HashMap::new();
        let mut table = Vec::with_capacity(usize::try_from(words).unwrap_or(1));
        for word_index in 0..words {
            let mut word = 0u64;
            for row in 0..rows_per_word {
                let compact = word_index * 64 + row;
                let original = deposit_bits(compact, minimised);
                let block = original >> BLOCK_BITS;
                let bits = *block_cache
                    .entry(block)
                    .or_insert_with(|| self.result_bits(block));
                word |= ((bits >> (original & 63)) & 1) << row;
            }
            table.push(word);
        }
        for word in table.iter().rev() {
            let _ = write!(identifier, "{word:0digits$x}");
        }
        identifier
    }

    /// Render with variable names, fully parenthesised
    #[must_use]
    pub fn display<'a>(&'a self, provider: &'a LeafIndexProvider) -> ExprDisplay<'a> {
        ExprDisplay {
            expr: self,
            provider,
        }
    }
}

impl PartialEq for BoolExpr {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if let (Some(left), Some(right)) = (self.cached_identifier(), other.cached_identifier()) {
            return left == right;
        }
        match self.compare(other) {
            Comparison::Equal => true,
            // functions of disjoint variables agree only as the same constant
            Comparison::Independent => {
                self.minimised_leaves() == 0
                    && other.minimised_leaves() == 0
                    && self.result_bits(0) & 1 == other.result_bits(0) & 1
            }
            _ => false,
        }
    }
}

impl Eq for BoolExpr {}

/// Display adapter returned by [`BoolExpr::display`].
pub struct ExprDisplay<'a> {
    expr: &'a BoolExpr,
    provider: &'a LeafIndexProvider,
}

impl std::fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let provider = self.provider;
        match self.expr.kind() {
            ExprKind::Leaf(index) => f.write_str(provider.name(*index).unwrap_or("?")),
            ExprKind::Not(inner) => write!(f, "!{}", inner.display(provider)),
            ExprKind::And(left, right) => write!(
                f,
                "({} & {})",
                left.display(provider),
                right.display(provider)
            ),
            ExprKind::Or(left, right) => write!(
                f,
                "({} | {})",
                left.display(provider),
                right.display(provider)
            ),
        }
    }
}

impl std::ops::Not for &BoolExpr {
    type Output = BoolExpr;

    fn not(self) -> BoolExpr {
        self.negate()
    }
}

impl std::ops::Not for BoolExpr {
    type Output = Self;

    fn not(self) -> Self {
        self.negate()
    }
}

impl std::ops::BitAnd for &BoolExpr {
    type Output = BoolExpr;

    fn bitand(self, rhs: Self) -> BoolExpr {
        self.and(rhs)
    }
}

impl std::ops::BitAnd for BoolExpr {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self::and(&self, &rhs)
    }
}

impl std::ops::BitOr for &BoolExpr {
    type Output = BoolExpr;

    fn bitor(self, rhs: Self) -> BoolExpr {
        self.or(rhs)
    }
}

impl std::ops::BitOr for BoolExpr {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::or(&self, &rhs)
    }
}
