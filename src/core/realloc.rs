/*!
 * Reallocation Fallbacks
 * Shared resize paths for policies without native support
 */

use super::block::{block_copy, Block};
use super::traits::{Allocator, Expandable};

/// Resolve the trivial resize cases every policy shares
///
/// - same size: nothing to do
/// - `new_size == 0`: deallocate, block becomes empty
/// - empty block: plain allocation
///
/// Returns `true` when one of these applied and succeeded.
pub fn handled_default<A: Allocator + ?Sized>(
    allocator: &A,
    block: &mut Block,
    new_size: usize,
) -> bool {
    if block.len() == new_size {
        return true;
    }
    if new_size == 0 {
        allocator.deallocate(block.take());
        return true;
    }
    if block.is_empty() {
        *block = allocator.allocate(new_size);
        return !block.is_empty();
    }
    false
}

/// Like [`handled_default`], but also tries to grow in place first
pub fn handled_by_expand<A: Expandable + ?Sized>(
    allocator: &A,
    block: &mut Block,
    new_size: usize,
) -> bool {
    if block.is_empty() || new_size == 0 || block.len() == new_size {
        return handled_default(allocator, block, new_size);
    }
    new_size > block.len() && allocator.expand(block, new_size - block.len())
}

/// Move a block from `old` to a fresh allocation of `new_size` bytes in `new`
///
/// `block` must have been produced by `old`. On failure it stays untouched.
pub fn with_copy<O, N>(old: &O, new: &N, block: &mut Block, new_size: usize) -> bool
where
    O: Allocator + ?Sized,
    N: Allocator + ?Sized,
{
    let fresh = new.allocate(new_size);
    if fresh.is_empty() {
        return false;
    }
    // Safety: both blocks are live and come from distinct allocations.
    unsafe { block_copy(block, &fresh) };
    old.deallocate(std::mem::replace(block, fresh));
    true
}
