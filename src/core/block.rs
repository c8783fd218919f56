/*!
 * Memory Block
 * The universal allocation result exchanged by every policy
 */

use std::fmt;
use std::ptr;

/// Address/length pair describing a piece of memory handed out by a policy
///
/// A block is move-only: whoever holds it is responsible for handing it back
/// to the policy that produced it. The empty block (null pointer, zero
/// length) is the failure sentinel returned by every operation that cannot
/// be satisfied.
///
/// # Example
///
/// ```ignore
/// let block = allocator.allocate(64);
/// if block.is_empty() {
///     // capacity exhausted, retry policy is up to the caller
/// }
/// allocator.deallocate(block);
/// ```
#[derive(PartialEq, Eq)]
pub struct Block {
    ptr: *mut u8,
    len: usize,
}

// Safety: a block is an address and a length. Reading or writing through it
// is already unsafe and the caller must uphold aliasing there.
unsafe impl Send for Block {}
unsafe impl Sync for Block {}

impl Block {
    /// The empty block
    #[inline]
    pub const fn empty() -> Self {
        Self {
            ptr: ptr::null_mut(),
            len: 0,
        }
    }

    /// Describe `len` bytes starting at `ptr`
    ///
    /// A null `ptr` or zero `len` yields the empty block, so the
    /// "non-null pointer pairs with its true length" invariant holds.
    #[inline]
    pub fn new(ptr: *mut u8, len: usize) -> Self {
        if ptr.is_null() || len == 0 {
            return Self::empty();
        }
        Self { ptr, len }
    }

    /// Start address
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }

    /// Length in bytes
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for the failure/empty sentinel
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.ptr.is_null()
    }

    /// One past the last byte
    #[inline]
    pub fn end(&self) -> *mut u8 {
        self.ptr.wrapping_add(self.len)
    }

    /// Whether `addr` falls inside this block
    #[inline]
    pub fn contains(&self, addr: *const u8) -> bool {
        !self.is_empty() && (self.ptr as *const u8) <= addr && addr < (self.end() as *const u8)
    }

    /// Reset to the empty block, returning the previous value
    #[inline]
    pub fn take(&mut self) -> Block {
        std::mem::take(self)
    }

    /// Byte view of the block
    ///
    /// # Safety
    ///
    /// The block must describe live memory that is not mutated for `'a`.
    #[inline]
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        if self.is_empty() {
            return &[];
        }
        std::slice::from_raw_parts(self.ptr, self.len)
    }

    /// Mutable byte view of the block
    ///
    /// # Safety
    ///
    /// The block must describe live memory with no other references for `'a`.
    #[inline]
    pub unsafe fn as_mut_slice<'a>(&mut self) -> &'a mut [u8] {
        if self.is_empty() {
            return &mut [];
        }
        std::slice::from_raw_parts_mut(self.ptr, self.len)
    }

    /// Reinterpret this block with a different length (same start)
    #[inline]
    pub(crate) fn with_len(self, len: usize) -> Block {
        Block::new(self.ptr, len)
    }

    /// Duplicate the address/length pair
    ///
    /// Only for internal bookkeeping: the duplicate must never be handed back
    /// to a policy alongside the original.
    #[inline]
    pub(crate) fn alias(&self) -> Block {
        Block {
            ptr: self.ptr,
            len: self.len,
        }
    }
}

impl Default for Block {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// Copy `min(source.len(), destination.len())` bytes between two blocks
///
/// # Safety
///
/// Both blocks must describe live, non-overlapping memory.
#[inline]
pub(crate) unsafe fn block_copy(source: &Block, destination: &Block) {
    let count = source.len().min(destination.len());
    if count == 0 {
        return;
    }
    ptr::copy_nonoverlapping(source.as_ptr(), destination.as_ptr(), count);
}

/// Round `n` up to the next multiple of `basis`
#[inline(always)]
pub const fn round_to_alignment(basis: usize, n: usize) -> usize {
    let remainder = n % basis;
    if remainder == 0 {
        n
    } else {
        n + (basis - remainder)
    }
}
