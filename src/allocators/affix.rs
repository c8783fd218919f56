/*!
 * Affix Allocator
 * Places a prefix value before and a suffix value after every user block
 *
 * ## Layout
 *
 * ```text
 * inner block (from parent)
 * ┌──────────────┬──────────────────────────┬────────┐
 * │ pad + prefix │ user region (returned)   │ suffix │
 * └──────────────┴──────────────────────────┴────────┘
 * ```
 *
 * The prefix region is padded to [`DEFAULT_ALIGNMENT`] so the user pointer
 * keeps the parent's alignment. Both affixes touch the user region: the
 * prefix ends where it starts and the suffix starts where it ends, so a
 * one-byte overrun in either direction lands on an affix. Affixes are
 * accessed unaligned. If the parent hands out more than was
 * asked for, the user region absorbs the surplus and the suffix moves to the
 * very end of the inner block.
 */

use crate::core::limits::DEFAULT_ALIGNMENT;
use crate::core::realloc;
use crate::core::{
    round_to_alignment, Allocator, Block, BulkResettable, Expandable, OwnershipTestable,
};
use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr;

/// Decorates a parent policy with prefix and/or suffix values
///
/// `P` and `S` must be `Copy + Default`; `()` disables that side. Affixes
/// are default-initialized on allocation and carried along on `expand` and
/// `reallocate`.
///
/// # Example
///
/// ```ignore
/// let tagged: AffixAllocator<SystemAllocator, u32> = AffixAllocator::new(SystemAllocator);
/// let block = tagged.allocate(100);
/// tagged.write_prefix(&block, 7);
/// assert_eq!(unsafe { tagged.prefix(&block) }, Some(7));
/// ```
pub struct AffixAllocator<A, P = (), S = ()> {
    parent: A,
    _affixes: PhantomData<fn() -> (P, S)>,
}

impl<A, P, S> AffixAllocator<A, P, S>
where
    P: Copy + Default,
    S: Copy + Default,
{
    /// Bytes reserved in front of the user region
    pub const PREFIX_SIZE: usize = if size_of::<P>() == 0 {
        0
    } else {
        round_to_alignment(DEFAULT_ALIGNMENT, size_of::<P>())
    };

    /// Bytes reserved behind the user region
    pub const SUFFIX_SIZE: usize = size_of::<S>();

    const OVERHEAD: usize = Self::PREFIX_SIZE + Self::SUFFIX_SIZE;

    /// Offset of the prefix value inside the padded prefix region
    const PREFIX_OFFSET: usize = Self::PREFIX_SIZE - size_of::<P>();

    pub const fn new(parent: A) -> Self {
        Self {
            parent,
            _affixes: PhantomData,
        }
    }

    /// Wrapped policy
    #[inline]
    pub fn parent(&self) -> &A {
        &self.parent
    }

    /// Address of the prefix value belonging to `block` (null for the empty block)
    #[inline]
    pub fn prefix_ptr(&self, block: &Block) -> *mut P {
        if block.is_empty() || Self::PREFIX_SIZE == 0 {
            return ptr::null_mut();
        }
        block.as_ptr().wrapping_sub(size_of::<P>()) as *mut P
    }

    /// Address of the suffix value belonging to `block` (null for the empty block)
    #[inline]
    pub fn suffix_ptr(&self, block: &Block) -> *mut S {
        if block.is_empty() || Self::SUFFIX_SIZE == 0 {
            return ptr::null_mut();
        }
        block.end() as *mut S
    }

    /// Read the prefix of a block
    ///
    /// # Safety
    ///
    /// `block` must be a live block returned by this allocator.
    #[inline]
    pub unsafe fn prefix(&self, block: &Block) -> Option<P> {
        let p = self.prefix_ptr(block);
        (!p.is_null()).then(|| ptr::read_unaligned(p))
    }

    /// Read the suffix of a block
    ///
    /// # Safety
    ///
    /// `block` must be a live block returned by this allocator.
    #[inline]
    pub unsafe fn suffix(&self, block: &Block) -> Option<S> {
        let p = self.suffix_ptr(block);
        (!p.is_null()).then(|| ptr::read_unaligned(p))
    }

    /// Overwrite the prefix of a live block returned by this allocator
    #[inline]
    pub fn write_prefix(&self, block: &Block, value: P) {
        let p = self.prefix_ptr(block);
        if !p.is_null() {
            // Safety: the prefix region lies inside the inner block that
            // backs `block`
            unsafe { ptr::write_unaligned(p, value) };
        }
    }

    /// Overwrite the suffix of a live block returned by this allocator
    #[inline]
    pub fn write_suffix(&self, block: &Block, value: S) {
        let p = self.suffix_ptr(block);
        if !p.is_null() {
            // Safety: see `write_prefix`
            unsafe { ptr::write_unaligned(p, value) };
        }
    }

    #[inline]
    fn to_inner(outer: &Block) -> Block {
        Block::new(
            outer.as_ptr().wrapping_sub(Self::PREFIX_SIZE),
            outer.len() + Self::OVERHEAD,
        )
    }

    #[inline]
    fn to_outer(inner: Block) -> Block {
        debug_assert!(inner.len() > Self::OVERHEAD, "inner block too small for affixes");
        Block::new(
            inner.as_ptr().wrapping_add(Self::PREFIX_SIZE),
            inner.len() - Self::OVERHEAD,
        )
    }

    /// Write a suffix at the end of an inner block
    #[inline]
    fn place_suffix(inner: &Block, value: S) {
        if Self::SUFFIX_SIZE > 0 {
            let at = inner.end().wrapping_sub(Self::SUFFIX_SIZE) as *mut S;
            // Safety: the last SUFFIX_SIZE bytes of the inner block are ours
            unsafe { ptr::write_unaligned(at, value) };
        }
    }
}

impl<A, P, S> Default for AffixAllocator<A, P, S>
where
    A: Default,
    P: Copy + Default,
    S: Copy + Default,
{
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A, P, S> Allocator for AffixAllocator<A, P, S>
where
    A: Allocator,
    P: Copy + Default,
    S: Copy + Default,
{
    const ALIGNMENT: usize = if Self::PREFIX_SIZE == 0 || A::ALIGNMENT <= DEFAULT_ALIGNMENT {
        A::ALIGNMENT
    } else {
        DEFAULT_ALIGNMENT
    };

    const SUPPORTS_TRUNCATED_DEALLOCATION: bool =
        A::SUPPORTS_TRUNCATED_DEALLOCATION && Self::OVERHEAD == 0;

    fn allocate(&self, size: usize) -> Block {
        if size == 0 {
            return Block::empty();
        }
        let Some(inner_size) = size.checked_add(Self::OVERHEAD) else {
            return Block::empty();
        };
        let inner = self.parent.allocate(inner_size);
        if inner.is_empty() {
            return Block::empty();
        }
        if Self::PREFIX_SIZE > 0 {
            let at = inner.as_ptr().wrapping_add(Self::PREFIX_OFFSET) as *mut P;
            // Safety: the inner block starts with PREFIX_SIZE bytes of our own
            unsafe { ptr::write_unaligned(at, P::default()) };
        }
        Self::place_suffix(&inner, S::default());
        Self::to_outer(inner)
    }

    fn deallocate(&self, block: Block) {
        if block.is_empty() {
            return;
        }
        self.parent.deallocate(Self::to_inner(&block));
    }

    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        if realloc::handled_default(self, block, new_size) {
            return true;
        }
        let Some(inner_size) = new_size.checked_add(Self::OVERHEAD) else {
            return false;
        };
        // Safety: block is live and ours
        let suffix = unsafe { self.suffix(block) }.unwrap_or_default();
        let mut inner = Self::to_inner(block);
        if !self.parent.reallocate(&mut inner, inner_size) {
            return false;
        }
        Self::place_suffix(&inner, suffix);
        *block = Self::to_outer(inner);
        true
    }
}

impl<A, P, S> OwnershipTestable for AffixAllocator<A, P, S>
where
    A: OwnershipTestable,
    P: Copy + Default,
    S: Copy + Default,
{
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        !block.is_empty() && self.parent.owns(&Self::to_inner(block))
    }
}

impl<A, P, S> Expandable for AffixAllocator<A, P, S>
where
    A: Expandable,
    P: Copy + Default,
    S: Copy + Default,
{
    fn expand(&self, block: &mut Block, delta: usize) -> bool {
        if delta == 0 {
            return true;
        }
        if block.is_empty() {
            *block = self.allocate(delta);
            return !block.is_empty();
        }
        // Safety: block is live and ours
        let suffix = unsafe { self.suffix(block) }.unwrap_or_default();
        let mut inner = Self::to_inner(block);
        if !self.parent.expand(&mut inner, delta) {
            return false;
        }
        Self::place_suffix(&inner, suffix);
        *block = Self::to_outer(inner);
        true
    }
}

impl<A, P, S> BulkResettable for AffixAllocator<A, P, S>
where
    A: BulkResettable,
    P: Copy + Default,
    S: Copy + Default,
{
    #[inline]
    fn deallocate_all(&self) {
        self.parent.deallocate_all()
    }
}
