/*!
 * Free List
 *
 * Caches freed blocks of one size class for instant reuse.
 *
 * ## Design
 *
 * Every block a free list hands out is exactly `max_size` bytes, so any
 * pooled block can serve any request in `[min_size, max_size]`. Freed blocks
 * are kept by address in a bounded stack owned by the list; nothing is
 * threaded through the freed memory itself.
 *
 * - **Local**: a plain bounded stack; the list is `!Sync`
 * - **Shared**: a lock-free index stack; push and pop are CAS retry loops
 *
 * The parent only sees traffic on a pool miss, when the pool is full, and
 * when the list is flushed or dropped.
 */

use crate::core::limits::{DEFAULT_BATCH_ALLOCATIONS, DEFAULT_POOL_SIZE, MAX_SHARED_POOL_SIZE};
use crate::core::sync::PoolStack;
use crate::core::tunable::UNSET;
use crate::core::{
    realloc, AllocError, AllocResult, Allocator, Block, Bounded, BulkResettable, Local,
    OwnershipTestable, Shared, SharingMode, Tunable,
};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ptr::NonNull;
use tracing::{debug, trace, warn};

/// Free list configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeListConfig {
    /// Smallest request served (`UNSET` to assign later)
    pub min_size: usize,
    /// Largest request served and size of every block (`UNSET` to assign later)
    pub max_size: usize,
    /// Maximum number of cached blocks
    pub pool_size: usize,
    /// Blocks fetched from the parent on a pool miss
    pub batch_allocations: usize,
}

impl Default for FreeListConfig {
    fn default() -> Self {
        Self::deferred()
    }
}

impl FreeListConfig {
    /// Configuration for a fixed size range
    pub const fn new(min_size: usize, max_size: usize) -> Self {
        Self {
            min_size,
            max_size,
            pool_size: DEFAULT_POOL_SIZE,
            batch_allocations: DEFAULT_BATCH_ALLOCATIONS,
        }
    }

    /// Configuration whose bounds are assigned later through [`Bounded::set_bounds`]
    pub const fn deferred() -> Self {
        Self::new(UNSET, UNSET)
    }

    pub const fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub const fn with_batch_allocations(mut self, batch_allocations: usize) -> Self {
        self.batch_allocations = batch_allocations;
        self
    }

    pub fn validate(&self) -> AllocResult<()> {
        if self.batch_allocations == 0 {
            return Err(AllocError::InvalidConfig(
                "batch_allocations must be at least 1".into(),
            ));
        }
        if self.pool_size > MAX_SHARED_POOL_SIZE {
            return Err(AllocError::InvalidConfig(format!(
                "pool_size {} exceeds {}",
                self.pool_size, MAX_SHARED_POOL_SIZE
            )));
        }
        match (self.min_size == UNSET, self.max_size == UNSET) {
            (true, true) => Ok(()),
            (false, false) => validate_bounds(self.min_size, self.max_size),
            _ => Err(AllocError::InvalidConfig(
                "min_size and max_size must be set together".into(),
            )),
        }
    }
}

fn validate_bounds(min_size: usize, max_size: usize) -> AllocResult<()> {
    if max_size == 0 || min_size > max_size || max_size == UNSET {
        return Err(AllocError::InvalidConfig(format!(
            "invalid free list range [{min_size}, {max_size}]"
        )));
    }
    Ok(())
}

/// Pooling allocator for one size class
///
/// Use the [`FreeList`] and [`SharedFreeList`] aliases.
///
/// # Example
///
/// ```ignore
/// let list = FreeList::new(SystemAllocator, FreeListConfig::new(64, 128))?;
/// let block = list.allocate(100);   // 128 bytes from the parent
/// list.deallocate(block);           // cached
/// let again = list.allocate(64);    // same memory, no parent call
/// ```
pub struct FreeListBase<A: Allocator, M: SharingMode> {
    parent: A,
    min_size: Tunable,
    max_size: Tunable,
    pool: M::Pool,
    batch_allocations: usize,
    _mode: PhantomData<M>,
}

/// Single-threaded free list
pub type FreeList<A> = FreeListBase<A, Local>;

/// Free list safe for concurrent use
pub type SharedFreeList<A> = FreeListBase<A, Shared>;

impl<A: Allocator, M: SharingMode> FreeListBase<A, M> {
    pub fn new(parent: A, config: FreeListConfig) -> AllocResult<Self> {
        config.validate()?;
        let bound = |v: usize| {
            if v == UNSET {
                Tunable::deferred()
            } else {
                Tunable::fixed(v)
            }
        };
        Ok(Self {
            parent,
            min_size: bound(config.min_size),
            max_size: bound(config.max_size),
            pool: M::Pool::with_capacity(config.pool_size),
            batch_allocations: config.batch_allocations,
            _mode: PhantomData,
        })
    }

    /// List with default pool settings and bounds assigned later
    pub fn deferred(parent: A) -> Self {
        Self {
            parent,
            min_size: Tunable::deferred(),
            max_size: Tunable::deferred(),
            pool: M::Pool::with_capacity(DEFAULT_POOL_SIZE),
            batch_allocations: DEFAULT_BATCH_ALLOCATIONS,
            _mode: PhantomData,
        }
    }

    #[inline]
    pub fn parent(&self) -> &A {
        &self.parent
    }

    /// Blocks currently cached
    #[inline]
    pub fn pooled(&self) -> usize {
        self.pool.len()
    }

    #[inline]
    pub fn pool_capacity(&self) -> usize {
        self.pool.capacity()
    }

    #[inline(always)]
    fn in_range(&self, size: usize) -> bool {
        self.min_size.value() <= size && size <= self.max_size.value()
    }

    #[inline(always)]
    fn pooled_block(&self, ptr: NonNull<u8>) -> Block {
        Block::new(ptr.as_ptr(), self.max_size.value())
    }

    /// Cache `block` or hand it back to the parent if the pool is full
    #[inline]
    fn recycle(&self, block: Block) {
        let Some(ptr) = NonNull::new(block.as_ptr()) else {
            return;
        };
        if self.pool.push(ptr).is_err() {
            self.parent.deallocate(block);
        }
    }

    /// Pool miss: fetch `batch_allocations` blocks, return one, cache the rest
    fn refill(&self) -> Block {
        let block_size = self.max_size.value();
        trace!(block_size, batch = self.batch_allocations, "free list refill");

        if self.batch_allocations == 1 {
            return self.parent.allocate(block_size);
        }

        if A::SUPPORTS_TRUNCATED_DEALLOCATION {
            if let Some(total) = block_size.checked_mul(self.batch_allocations) {
                let batch = self.parent.allocate(total);
                if !batch.is_empty() {
                    for i in 1..self.batch_allocations {
                        let slice =
                            Block::new(batch.as_ptr().wrapping_add(i * block_size), block_size);
                        self.recycle(slice);
                    }
                    return batch.with_len(block_size);
                }
            }
            return self.parent.allocate(block_size);
        }

        for _ in 1..self.batch_allocations {
            let block = self.parent.allocate(block_size);
            let Some(ptr) = NonNull::new(block.as_ptr()) else {
                break;
            };
            if self.pool.push(ptr).is_err() {
                // Pool filled up concurrently: hand this one out
                return block;
            }
        }
        let block = self.parent.allocate(block_size);
        if block.is_empty() {
            return self
                .pool
                .pop()
                .map(|ptr| self.pooled_block(ptr))
                .unwrap_or_default();
        }
        block
    }

    /// Release every cached block to the parent
    fn drain(&self) -> usize {
        let mut released = 0;
        while let Some(ptr) = self.pool.pop() {
            self.parent.deallocate(self.pooled_block(ptr));
            released += 1;
        }
        released
    }
}

impl<A: Allocator + Default, M: SharingMode> Default for FreeListBase<A, M> {
    fn default() -> Self {
        Self::deferred(A::default())
    }
}

impl<A: Allocator, M: SharingMode> Drop for FreeListBase<A, M> {
    fn drop(&mut self) {
        self.drain();
    }
}

impl<A: Allocator, M: SharingMode> std::fmt::Debug for FreeListBase<A, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreeList")
            .field("shared", &M::SHARED)
            .field("min_size", &self.min_size.value())
            .field("max_size", &self.max_size.value())
            .field("pooled", &self.pooled())
            .field("pool_capacity", &self.pool_capacity())
            .finish()
    }
}

impl<A: Allocator, M: SharingMode> Allocator for FreeListBase<A, M> {
    const ALIGNMENT: usize = A::ALIGNMENT;
    const SUPPORTS_TRUNCATED_DEALLOCATION: bool = A::SUPPORTS_TRUNCATED_DEALLOCATION;

    fn allocate(&self, size: usize) -> Block {
        if size == 0 || !self.max_size.is_set() || !self.in_range(size) {
            return Block::empty();
        }
        match self.pool.pop() {
            Some(ptr) => self.pooled_block(ptr),
            None => self.refill(),
        }
    }

    fn deallocate(&self, block: Block) {
        if block.is_empty() {
            return;
        }
        if !self.owns(&block) {
            warn!(
                len = block.len(),
                min_size = self.min_size.value(),
                max_size = self.max_size.value(),
                "block not produced by this free list, releasing to parent"
            );
            self.parent.deallocate(block);
            return;
        }
        self.recycle(block);
    }

    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        if realloc::handled_default(self, block, new_size) {
            return true;
        }
        // Every block already spans max_size, so any in-range size fits as is
        self.in_range(new_size) && self.owns(block)
    }
}

impl<A: Allocator, M: SharingMode> OwnershipTestable for FreeListBase<A, M> {
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        // Every block handed out spans exactly max_size
        !block.is_empty() && self.max_size.is_set() && block.len() == self.max_size.value()
    }
}

impl<A: Allocator, M: SharingMode> BulkResettable for FreeListBase<A, M> {
    fn deallocate_all(&self) {
        let released = self.drain();
        debug!(released, "free list flushed");
    }
}

impl<A: Allocator, M: SharingMode> Bounded for FreeListBase<A, M> {
    fn set_bounds(&self, min_size: usize, max_size: usize) -> AllocResult<()> {
        validate_bounds(min_size, max_size)?;
        if self.min_size.is_set() || self.max_size.is_set() {
            return Err(AllocError::SettingFrozen(self.max_size.value()));
        }
        self.min_size.set(min_size)?;
        self.max_size.set(max_size)
    }

    #[inline]
    fn min_size(&self) -> usize {
        self.min_size.value()
    }

    #[inline]
    fn max_size(&self) -> usize {
        self.max_size.value()
    }
}
