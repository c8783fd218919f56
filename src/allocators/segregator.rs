/*!
 * Segregator
 * Routes requests to a small or a large policy by a size threshold
 */

use crate::core::realloc;
use crate::core::{
    AllocResult, Allocator, Block, BulkResettable, Expandable, OwnershipTestable, Tunable,
};

/// Size-threshold router
///
/// Requests strictly below the threshold go to the small policy, everything
/// else to the large one. Deallocation routes by the block length alone, so
/// neither child needs to test ownership. The small policy must therefore
/// never return a block whose length reaches the threshold.
///
/// # Example
///
/// ```ignore
/// let a = Segregator::new(small_pool, SystemAllocator, 256);
/// let tiny = a.allocate(32);   // small_pool
/// let big = a.allocate(4096);  // SystemAllocator
/// ```
#[derive(Debug)]
pub struct Segregator<S, L> {
    small: S,
    large: L,
    threshold: Tunable,
}

impl<S, L> Segregator<S, L> {
    /// Router with a fixed threshold
    pub const fn new(small: S, large: L, threshold: usize) -> Self {
        Self::with_threshold(small, large, Tunable::fixed(threshold))
    }

    /// Router with a threshold assigned later through [`Segregator::set_threshold`]
    pub const fn deferred(small: S, large: L) -> Self {
        Self::with_threshold(small, large, Tunable::deferred())
    }

    pub const fn with_threshold(small: S, large: L, threshold: Tunable) -> Self {
        Self {
            small,
            large,
            threshold,
        }
    }

    #[inline(always)]
    pub fn threshold(&self) -> usize {
        self.threshold.value()
    }

    /// Assign a deferred threshold (once)
    pub fn set_threshold(&self, threshold: usize) -> AllocResult<()> {
        self.threshold.set(threshold)
    }

    #[inline]
    pub fn small(&self) -> &S {
        &self.small
    }

    #[inline]
    pub fn large(&self) -> &L {
        &self.large
    }

    #[inline(always)]
    fn is_small(&self, size: usize) -> bool {
        size < self.threshold()
    }
}

impl<S, L> Allocator for Segregator<S, L>
where
    S: Allocator,
    L: Allocator,
{
    const ALIGNMENT: usize = if S::ALIGNMENT < L::ALIGNMENT {
        S::ALIGNMENT
    } else {
        L::ALIGNMENT
    };

    const SUPPORTS_TRUNCATED_DEALLOCATION: bool =
        S::SUPPORTS_TRUNCATED_DEALLOCATION && L::SUPPORTS_TRUNCATED_DEALLOCATION;

    #[inline]
    fn allocate(&self, size: usize) -> Block {
        if size == 0 {
            return Block::empty();
        }
        if self.is_small(size) {
            let block = self.small.allocate(size);
            debug_assert!(
                block.is_empty() || self.is_small(block.len()),
                "small policy returned {} bytes at or above threshold {}",
                block.len(),
                self.threshold()
            );
            block
        } else {
            self.large.allocate(size)
        }
    }

    #[inline]
    fn deallocate(&self, block: Block) {
        if block.is_empty() {
            return;
        }
        if self.is_small(block.len()) {
            self.small.deallocate(block);
        } else {
            self.large.deallocate(block);
        }
    }

    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        if realloc::handled_default(self, block, new_size) {
            return true;
        }
        match (self.is_small(block.len()), self.is_small(new_size)) {
            (true, true) => {
                if !self.small.reallocate(block, new_size) {
                    return false;
                }
                debug_assert!(
                    self.is_small(block.len()),
                    "small policy resized past threshold"
                );
                true
            }
            (false, false) => self.large.reallocate(block, new_size),
            (true, false) => realloc::with_copy(&self.small, &self.large, block, new_size),
            (false, true) => realloc::with_copy(&self.large, &self.small, block, new_size),
        }
    }
}

impl<S, L> OwnershipTestable for Segregator<S, L>
where
    S: OwnershipTestable,
    L: OwnershipTestable,
{
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        if self.is_small(block.len()) {
            self.small.owns(block)
        } else {
            self.large.owns(block)
        }
    }
}

impl<S, L> Expandable for Segregator<S, L>
where
    S: Expandable,
    L: Expandable,
{
    fn expand(&self, block: &mut Block, delta: usize) -> bool {
        if delta == 0 {
            return true;
        }
        if block.is_empty() {
            *block = self.allocate(delta);
            return !block.is_empty();
        }
        if !self.is_small(block.len()) {
            return self.large.expand(block, delta);
        }
        // Growing a small block past the threshold would break routing
        if !self.is_small(block.len().saturating_add(delta)) {
            return false;
        }
        let mut grown = block.alias();
        if !self.small.expand(&mut grown, delta) {
            return false;
        }
        debug_assert!(self.is_small(grown.len()), "small policy expanded past threshold");
        *block = grown;
        true
    }
}

impl<S, L> BulkResettable for Segregator<S, L>
where
    S: BulkResettable,
    L: BulkResettable,
{
    fn deallocate_all(&self) {
        self.small.deallocate_all();
        self.large.deallocate_all();
    }
}
