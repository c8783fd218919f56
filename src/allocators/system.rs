/*!
 * Leaf Allocators
 * Direct wrappers over the platform allocation primitive
 */

use crate::core::limits::DEFAULT_ALIGNMENT;
use crate::core::realloc;
use crate::core::{Allocator, Block, BulkResettable, Expandable, OwnershipTestable};
use std::alloc::{self, Layout};
use tracing::trace;

#[inline]
fn system_allocate(size: usize, align: usize) -> Block {
    if size == 0 {
        return Block::empty();
    }
    let Ok(layout) = Layout::from_size_align(size, align) else {
        return Block::empty();
    };
    // Safety: layout has a non-zero size
    let ptr = unsafe { alloc::alloc(layout) };
    if ptr.is_null() {
        trace!(size, align, "system allocation failed");
    }
    Block::new(ptr, size)
}

#[inline]
fn system_deallocate(block: Block, align: usize) {
    if block.is_empty() {
        return;
    }
    // Safety: the block was produced by `system_allocate` with the same
    // alignment and its length is the size it was requested with
    unsafe {
        let layout = Layout::from_size_align_unchecked(block.len(), align);
        alloc::dealloc(block.as_ptr(), layout);
    }
}

#[inline]
fn system_reallocate<A: Allocator>(
    allocator: &A,
    block: &mut Block,
    new_size: usize,
    align: usize,
) -> bool {
    if realloc::handled_default(allocator, block, new_size) {
        return true;
    }
    if Layout::from_size_align(new_size, align).is_err() {
        return false;
    }
    // Safety: same layout the block was allocated with; new_size is non-zero
    let ptr = unsafe {
        let layout = Layout::from_size_align_unchecked(block.len(), align);
        alloc::realloc(block.as_ptr(), layout, new_size)
    };
    if ptr.is_null() {
        return false;
    }
    *block = Block::new(ptr, new_size);
    true
}

/// Allocator backed by the global system allocator
///
/// Returns exactly the requested number of bytes, aligned to
/// [`DEFAULT_ALIGNMENT`]. Cannot test ownership, so it usually sits at the
/// end of a fallback chain or behind a segregator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    const ALIGNMENT: usize = DEFAULT_ALIGNMENT;

    #[inline]
    fn allocate(&self, size: usize) -> Block {
        system_allocate(size, Self::ALIGNMENT)
    }

    #[inline]
    fn deallocate(&self, block: Block) {
        system_deallocate(block, Self::ALIGNMENT)
    }

    #[inline]
    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        system_reallocate(self, block, new_size, Self::ALIGNMENT)
    }
}

/// System allocator with a caller-chosen alignment
///
/// `ALIGN` must be a power of two; anything else fails to compile.
///
/// # Example
///
/// ```ignore
/// let page_aligned = AlignedSystemAllocator::<4096>;
/// let block = page_aligned.allocate(100);
/// assert_eq!(block.as_ptr() as usize % 4096, 0);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct AlignedSystemAllocator<const ALIGN: usize>;

impl<const ALIGN: usize> AlignedSystemAllocator<ALIGN> {
    const VALID: () = assert!(ALIGN.is_power_of_two(), "alignment must be a power of two");
}

impl<const ALIGN: usize> Allocator for AlignedSystemAllocator<ALIGN> {
    const ALIGNMENT: usize = ALIGN;

    #[inline]
    fn allocate(&self, size: usize) -> Block {
        let () = Self::VALID;
        system_allocate(size, ALIGN)
    }

    #[inline]
    fn deallocate(&self, block: Block) {
        system_deallocate(block, ALIGN)
    }

    #[inline]
    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        let () = Self::VALID;
        system_reallocate(self, block, new_size, ALIGN)
    }
}

/// Allocator that never succeeds
///
/// Terminates fallback chains and stands in for a disabled branch of a
/// segregator. Owns only the empty block.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAllocator;

impl Allocator for NullAllocator {
    const ALIGNMENT: usize = 64 * 1024;
    const SUPPORTS_TRUNCATED_DEALLOCATION: bool = true;

    #[inline]
    fn allocate(&self, _size: usize) -> Block {
        Block::empty()
    }

    #[inline]
    fn deallocate(&self, block: Block) {
        debug_assert!(block.is_empty(), "NullAllocator cannot free {block:?}");
    }

    #[inline]
    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        block.is_empty() && new_size == 0
    }
}

impl OwnershipTestable for NullAllocator {
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        block.is_empty()
    }
}

impl Expandable for NullAllocator {
    #[inline]
    fn expand(&self, _block: &mut Block, delta: usize) -> bool {
        delta == 0
    }
}

impl BulkResettable for NullAllocator {
    #[inline]
    fn deallocate_all(&self) {}
}
