/*!
 * Stack Allocator
 * LIFO bump allocation over a fixed inline buffer
 *
 * ## Reclaiming
 *
 * Only the most recent allocation can be given back. Freeing any other block
 * is accepted but leaves its bytes in use until [`BulkResettable::deallocate_all`]
 * rewinds the whole buffer. This is a deliberate non-reclaiming policy, not
 * a leak in the usual sense: the buffer lives and dies with the allocator.
 */

use crate::core::limits::{DEFAULT_STACK_ALIGNMENT, STACK_BUFFER_ALIGNMENT};
use crate::core::realloc;
use crate::core::{
    round_to_alignment, Allocator, Block, BulkResettable, Expandable, OwnershipTestable,
};
use std::cell::{Cell, UnsafeCell};
use tracing::trace;

#[repr(C, align(64))]
struct Buffer<const SIZE: usize>([u8; SIZE]);

/// Bump allocator over `SIZE` inline bytes
///
/// Every allocation is rounded up to `ALIGN` (a power of two, at most 64).
/// The buffer is part of the value, so blocks point into the allocator
/// itself: moving the allocator while blocks are live invalidates them.
/// Keep it in one place (a local binding, a `Box`, a static) for as long as
/// its blocks are in use.
///
/// # Performance
///
/// - **Allocate**: one comparison and a cursor bump
/// - **Deallocate**: O(1), reclaims only the most recent block
///
/// # Example
///
/// ```ignore
/// let stack = StackAllocator::<1024>::new();
/// let a = stack.allocate(100);
/// let b = stack.allocate(200);
/// stack.deallocate(b);
/// stack.deallocate(a);
/// assert_eq!(stack.used(), 0);
/// ```
pub struct StackAllocator<const SIZE: usize, const ALIGN: usize = DEFAULT_STACK_ALIGNMENT> {
    buffer: UnsafeCell<Buffer<SIZE>>,
    cursor: Cell<usize>,
}

impl<const SIZE: usize, const ALIGN: usize> StackAllocator<SIZE, ALIGN> {
    const VALID: () = assert!(
        ALIGN.is_power_of_two() && ALIGN <= STACK_BUFFER_ALIGNMENT,
        "stack alignment must be a power of two no larger than the buffer alignment"
    );

    pub const fn new() -> Self {
        let () = Self::VALID;
        Self {
            buffer: UnsafeCell::new(Buffer([0; SIZE])),
            cursor: Cell::new(0),
        }
    }

    /// Total buffer size
    #[inline]
    pub const fn capacity(&self) -> usize {
        SIZE
    }

    /// Bytes between the buffer start and the cursor
    #[inline]
    pub fn used(&self) -> usize {
        self.cursor.get()
    }

    /// Bytes still available
    #[inline]
    pub fn remaining(&self) -> usize {
        SIZE - self.cursor.get()
    }

    #[inline(always)]
    fn base(&self) -> *mut u8 {
        self.buffer.get() as *mut u8
    }

    #[inline(always)]
    fn offset_of(&self, block: &Block) -> usize {
        block.as_ptr() as usize - self.base() as usize
    }

    /// Whether `block` ends at the cursor
    #[inline]
    fn is_last(&self, block: &Block) -> bool {
        self.offset_of(block) + block.len() == self.cursor.get()
    }

    #[inline(always)]
    fn aligned(size: usize) -> Option<usize> {
        (size <= SIZE).then(|| round_to_alignment(ALIGN, size))
    }
}

impl<const SIZE: usize, const ALIGN: usize> Default for StackAllocator<SIZE, ALIGN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize, const ALIGN: usize> std::fmt::Debug for StackAllocator<SIZE, ALIGN> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackAllocator")
            .field("capacity", &SIZE)
            .field("used", &self.used())
            .finish()
    }
}

impl<const SIZE: usize, const ALIGN: usize> Allocator for StackAllocator<SIZE, ALIGN> {
    const ALIGNMENT: usize = ALIGN;

    fn allocate(&self, size: usize) -> Block {
        if size == 0 {
            return Block::empty();
        }
        let Some(length) = Self::aligned(size) else {
            return Block::empty();
        };
        let start = self.cursor.get();
        if length > SIZE - start {
            return Block::empty();
        }
        self.cursor.set(start + length);
        Block::new(self.base().wrapping_add(start), length)
    }

    fn deallocate(&self, block: Block) {
        if block.is_empty() {
            return;
        }
        debug_assert!(self.owns(&block), "block {block:?} is not from this stack");
        if self.is_last(&block) {
            self.cursor.set(self.offset_of(&block));
        } else {
            trace!(len = block.len(), "stack block freed out of order, kept until reset");
        }
    }

    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        if realloc::handled_default(self, block, new_size) {
            return true;
        }
        let Some(length) = Self::aligned(new_size) else {
            return false;
        };
        let offset = self.offset_of(block);

        if self.is_last(block) {
            if length > SIZE - offset {
                return false;
            }
            self.cursor.set(offset + length);
            *block = Block::new(block.as_ptr(), length);
            return true;
        }

        if length <= block.len() {
            *block = Block::new(block.as_ptr(), length);
            return true;
        }

        realloc::with_copy(self, self, block, new_size)
    }
}

impl<const SIZE: usize, const ALIGN: usize> OwnershipTestable for StackAllocator<SIZE, ALIGN> {
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        let base = self.base() as usize;
        let ptr = block.as_ptr() as usize;
        !block.is_empty() && ptr >= base && ptr < base + SIZE
    }
}

impl<const SIZE: usize, const ALIGN: usize> Expandable for StackAllocator<SIZE, ALIGN> {
    fn expand(&self, block: &mut Block, delta: usize) -> bool {
        if delta == 0 {
            return true;
        }
        if block.is_empty() {
            *block = self.allocate(delta);
            return !block.is_empty();
        }
        if !self.is_last(block) {
            return false;
        }
        let Some(grow) = Self::aligned(delta) else {
            return false;
        };
        if grow > self.remaining() {
            return false;
        }
        self.cursor.set(self.cursor.get() + grow);
        *block = Block::new(block.as_ptr(), block.len() + grow);
        true
    }
}

impl<const SIZE: usize, const ALIGN: usize> BulkResettable for StackAllocator<SIZE, ALIGN> {
    fn deallocate_all(&self) {
        self.cursor.set(0);
    }
}
