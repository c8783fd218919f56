/*!
 * Capability Contract
 * The operation set every allocator policy implements or omits
 *
 * Only `allocate`/`deallocate` are mandatory. Everything else is an explicit
 * capability trait so combinators can bound their children by exactly what
 * they need and light up their own capabilities when the children have them.
 */

use super::block::Block;
use super::errors::AllocResult;
use super::limits::DEFAULT_ALIGNMENT;
use super::realloc;
use std::sync::Arc;

/// Core allocator interface
///
/// All methods take `&self`. Single-threaded policies keep their state in
/// `Cell`/`RefCell` and are therefore `!Sync`; shared policies are `Sync`.
pub trait Allocator {
    /// Alignment guaranteed for every returned pointer
    const ALIGNMENT: usize = DEFAULT_ALIGNMENT;

    /// Whether a sub-slice of a returned block may be deallocated on its own
    const SUPPORTS_TRUNCATED_DEALLOCATION: bool = false;

    /// Allocate at least `size` bytes, or return the empty block
    fn allocate(&self, size: usize) -> Block;

    /// Hand a block back. The empty block is ignored.
    fn deallocate(&self, block: Block);

    /// Resize a block, possibly moving it
    ///
    /// On success `block` describes the resized memory and the first
    /// `min(old, new)` bytes are preserved. On failure it is left untouched.
    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        if realloc::handled_default(self, block, new_size) {
            return true;
        }
        realloc::with_copy(self, self, block, new_size)
    }
}

/// Policies that can tell whether they produced a block
pub trait OwnershipTestable: Allocator {
    fn owns(&self, block: &Block) -> bool;
}

/// Policies that can grow a block in place
pub trait Expandable: Allocator {
    /// Grow `block` by at least `delta` bytes without moving it
    fn expand(&self, block: &mut Block, delta: usize) -> bool;
}

/// Policies that can release everything at once
pub trait BulkResettable: Allocator {
    /// Invalidate every outstanding block
    fn deallocate_all(&self);
}

/// Policies serving a size range whose bounds may be assigned after construction
///
/// Bucketizers build their buckets first and hand each one its range.
pub trait Bounded: Allocator {
    /// Assign `[min_size, max_size]` once
    fn set_bounds(&self, min_size: usize, max_size: usize) -> AllocResult<()>;

    fn min_size(&self) -> usize;

    fn max_size(&self) -> usize;
}

impl<A: Allocator + ?Sized> Allocator for &A {
    const ALIGNMENT: usize = A::ALIGNMENT;
    const SUPPORTS_TRUNCATED_DEALLOCATION: bool = A::SUPPORTS_TRUNCATED_DEALLOCATION;

    #[inline]
    fn allocate(&self, size: usize) -> Block {
        (**self).allocate(size)
    }

    #[inline]
    fn deallocate(&self, block: Block) {
        (**self).deallocate(block)
    }

    #[inline]
    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        (**self).reallocate(block, new_size)
    }
}

impl<A: OwnershipTestable + ?Sized> OwnershipTestable for &A {
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        (**self).owns(block)
    }
}

impl<A: Expandable + ?Sized> Expandable for &A {
    #[inline]
    fn expand(&self, block: &mut Block, delta: usize) -> bool {
        (**self).expand(block, delta)
    }
}

impl<A: BulkResettable + ?Sized> BulkResettable for &A {
    #[inline]
    fn deallocate_all(&self) {
        (**self).deallocate_all()
    }
}

impl<A: Allocator + ?Sized> Allocator for Arc<A> {
    const ALIGNMENT: usize = A::ALIGNMENT;
    const SUPPORTS_TRUNCATED_DEALLOCATION: bool = A::SUPPORTS_TRUNCATED_DEALLOCATION;

    #[inline]
    fn allocate(&self, size: usize) -> Block {
        (**self).allocate(size)
    }

    #[inline]
    fn deallocate(&self, block: Block) {
        (**self).deallocate(block)
    }

    #[inline]
    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        (**self).reallocate(block, new_size)
    }
}

impl<A: OwnershipTestable + ?Sized> OwnershipTestable for Arc<A> {
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        (**self).owns(block)
    }
}

impl<A: Expandable + ?Sized> Expandable for Arc<A> {
    #[inline]
    fn expand(&self, block: &mut Block, delta: usize) -> bool {
        (**self).expand(block, delta)
    }
}

impl<A: BulkResettable + ?Sized> BulkResettable for Arc<A> {
    #[inline]
    fn deallocate_all(&self) {
        (**self).deallocate_all()
    }
}
