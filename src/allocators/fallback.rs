/*!
 * Fallback Allocator
 * Tries a primary policy first and falls back to a secondary one
 */

use crate::core::realloc;
use crate::core::{Allocator, Block, BulkResettable, Expandable, OwnershipTestable};

/// Primary/secondary composition
///
/// The primary must be able to test ownership so deallocation can be routed;
/// the secondary only needs it if the composition itself is asked `owns`.
///
/// # Example
///
/// ```ignore
/// // Small stack buffer first, system memory when it runs out
/// let a = FallbackAllocator::new(StackAllocator::<4096>::new(), SystemAllocator);
/// ```
#[derive(Debug, Default)]
pub struct FallbackAllocator<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> FallbackAllocator<P, S> {
    pub const fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    #[inline]
    pub fn primary(&self) -> &P {
        &self.primary
    }

    #[inline]
    pub fn secondary(&self) -> &S {
        &self.secondary
    }
}

impl<P, S> Allocator for FallbackAllocator<P, S>
where
    P: OwnershipTestable,
    S: Allocator,
{
    const ALIGNMENT: usize = if P::ALIGNMENT < S::ALIGNMENT {
        P::ALIGNMENT
    } else {
        S::ALIGNMENT
    };

    const SUPPORTS_TRUNCATED_DEALLOCATION: bool =
        P::SUPPORTS_TRUNCATED_DEALLOCATION && S::SUPPORTS_TRUNCATED_DEALLOCATION;

    #[inline]
    fn allocate(&self, size: usize) -> Block {
        if size == 0 {
            return Block::empty();
        }
        let block = self.primary.allocate(size);
        if !block.is_empty() {
            return block;
        }
        self.secondary.allocate(size)
    }

    #[inline]
    fn deallocate(&self, block: Block) {
        if block.is_empty() {
            return;
        }
        if self.primary.owns(&block) {
            self.primary.deallocate(block);
        } else {
            self.secondary.deallocate(block);
        }
    }

    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        if realloc::handled_default(self, block, new_size) {
            return true;
        }
        if self.primary.owns(block) {
            if self.primary.reallocate(block, new_size) {
                return true;
            }
            return realloc::with_copy(&self.primary, &self.secondary, block, new_size);
        }
        self.secondary.reallocate(block, new_size)
    }
}

impl<P, S> OwnershipTestable for FallbackAllocator<P, S>
where
    P: OwnershipTestable,
    S: OwnershipTestable,
{
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        self.primary.owns(block) || self.secondary.owns(block)
    }
}

impl<P, S> Expandable for FallbackAllocator<P, S>
where
    P: OwnershipTestable + Expandable,
    S: Expandable,
{
    fn expand(&self, block: &mut Block, delta: usize) -> bool {
        if delta == 0 {
            return true;
        }
        if block.is_empty() {
            *block = self.allocate(delta);
            return !block.is_empty();
        }
        if self.primary.owns(block) {
            self.primary.expand(block, delta)
        } else {
            self.secondary.expand(block, delta)
        }
    }
}

impl<P, S> BulkResettable for FallbackAllocator<P, S>
where
    P: OwnershipTestable + BulkResettable,
    S: BulkResettable,
{
    fn deallocate_all(&self) {
        self.primary.deallocate_all();
        self.secondary.deallocate_all();
    }
}
