//! Truth-table blocks.
//!
//! A guard over up to 62 variables has a truth table of up to 2^62 rows. The
//! table is produced lazily in 64-row blocks: the low six variables select the
//! row inside a block and the remaining variables select the block.

/// Maximum number of distinct guard variables.
pub const MAX_LEAVES: usize = 62;

/// Number of variables resolved inside a single 64-row block.
pub(crate) const BLOCK_BITS: u32 = 6;

/// Row patterns of the low six variables inside a block.
pub(crate) const LOW_PATTERNS: [u64; 6] = [
    0xAAAA_AAAA_AAAA_AAAA,
    0xCCCC_CCCC_CCCC_CCCC,
    0xF0F0_F0F0_F0F0_F0F0,
    0xFF00_FF00_FF00_FF00,
    0xFFFF_0000_FFFF_0000,
    0xFFFF_FFFF_0000_0000,
];

/// Truth bits of variable `index` within block `block`.
#[inline]
#[must_use]
pub(crate) const fn leaf_block(index: u32, block: u64) -> u64 {
    if index < BLOCK_BITS {
        LOW_PATTERNS[index as usize]
    } else if (block >> (index - BLOCK_BITS)) & 1 == 1 {
        u64::MAX
    } else {
        0
    }
}

/// The block selector mask for a leaf mask.
#[inline]
#[must_use]
pub(crate) const fn block_mask(leaves: u64) -> u64 {
    leaves >> BLOCK_BITS
}

/// Iterates every block number whose set bits lie inside `mask`, starting at 0.
///
/// Uses the `next = (prev - mask) & mask` submask walk; the walk ends when it
/// wraps back to zero.
#[derive(Debug, Clone)]
pub(crate) struct BlockWalk {
    mask: u64,
    next: Option<u64>,
}

impl BlockWalk {
    #[must_use]
    pub(crate) const fn new(mask: u64) -> Self {
        Self {
            mask,
            next: Some(0),
        }
    }
}

impl Iterator for BlockWalk {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let current = self.next?;
        let following = current.wrapping_sub(self.mask) & self.mask;
        self.next = (following != 0).then_some(following);
        Some(current)
    }
}

/// Spread the low bits of `value` onto the set bits of `mask`.
#[must_use]
pub(crate) fn deposit_bits(mut value: u64, mask: u64) -> u64 {
    let mut result = 0;
    let mut remaining = mask;
    while remaining != 0 && value != 0 {
        let lowest = remaining & remaining.wrapping_neg();
        if value & 1 == 1 {
            result |= lowest;
        }
        value >>= 1;
        remaining &= remaining - 1;
    }
    result
}

/// Iterates the indices of set bits in ascending order.
pub(crate) fn set_bits(mut mask: u64) -> impl Iterator<Item = u32> {
    std::iter::from_fn(move || {
        if mask == 0 {
            return None;
        }
        let index = mask.trailing_zeros();
        mask &= mask - 1;
        Some(index)
    })
}
