/*!
 * Bucketizer
 * Fixed-width size classes, each served by its own policy instance
 *
 * `[min_size, max_size]` is cut into buckets of `step` bytes. Bucket `i`
 * serves `[min + i*step, min + (i+1)*step - 1]`, so the bucket for a request
 * is found with one subtraction and one division.
 */

use crate::core::realloc;
use crate::core::{
    AllocError, AllocResult, Allocator, Block, Bounded, BulkResettable, OwnershipTestable,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Bucketizer size range and bucket width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketizerConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub step: usize,
}

impl BucketizerConfig {
    pub const fn new(min_size: usize, max_size: usize, step: usize) -> Self {
        Self {
            min_size,
            max_size,
            step,
        }
    }

    /// Number of buckets the range splits into
    pub const fn bucket_count(&self) -> usize {
        (self.max_size - self.min_size + 1) / self.step
    }

    pub fn validate(&self) -> AllocResult<()> {
        if self.min_size == 0 || self.step == 0 || self.min_size > self.max_size {
            return Err(AllocError::InvalidConfig(format!(
                "invalid bucket range [{}, {}] with step {}",
                self.min_size, self.max_size, self.step
            )));
        }
        if self.max_size == usize::MAX || (self.max_size - self.min_size + 1) % self.step != 0 {
            return Err(AllocError::InvalidConfig(format!(
                "range [{}, {}] is not a whole number of {}-byte buckets",
                self.min_size, self.max_size, self.step
            )));
        }
        Ok(())
    }
}

/// Size-class router over identical bucket policies
///
/// # Example
///
/// ```ignore
/// // 8 free lists: [17, 32], [33, 48], ..., [129, 144]
/// let buckets = Bucketizer::with_factory(
///     BucketizerConfig::new(17, 144, 16),
///     || FreeList::deferred(SystemAllocator),
/// )?;
/// let block = buckets.allocate(40);
/// assert_eq!(block.len(), 48);
/// ```
#[derive(Debug)]
pub struct Bucketizer<A> {
    config: BucketizerConfig,
    buckets: Box<[A]>,
}

impl<A: Bounded> Bucketizer<A> {
    /// Build the buckets with `A::default()`
    pub fn new(config: BucketizerConfig) -> AllocResult<Self>
    where
        A: Default,
    {
        Self::with_factory(config, A::default)
    }

    /// Build each bucket with `factory`, then assign its bounds
    pub fn with_factory(config: BucketizerConfig, factory: impl FnMut() -> A) -> AllocResult<Self> {
        config.validate()?;
        let buckets: Box<[A]> = std::iter::repeat_with(factory)
            .take(config.bucket_count())
            .collect();
        for (index, bucket) in buckets.iter().enumerate() {
            let (lower, upper) = Self::bounds_of(&config, index);
            bucket.set_bounds(lower, upper)?;
        }
        Ok(Self { config, buckets })
    }

    #[inline]
    fn bounds_of(config: &BucketizerConfig, index: usize) -> (usize, usize) {
        let lower = config.min_size + index * config.step;
        (lower, lower + config.step - 1)
    }

    #[inline]
    pub fn config(&self) -> &BucketizerConfig {
        &self.config
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Inclusive size range served by bucket `index`
    pub fn bucket_bounds(&self, index: usize) -> Option<(usize, usize)> {
        (index < self.buckets.len()).then(|| Self::bounds_of(&self.config, index))
    }

    #[inline]
    pub fn bucket(&self, index: usize) -> Option<&A> {
        self.buckets.get(index)
    }

    /// Bucket serving `size`, if any
    #[inline(always)]
    pub fn bucket_for(&self, size: usize) -> Option<usize> {
        (self.config.min_size..=self.config.max_size)
            .contains(&size)
            .then(|| (size - self.config.min_size) / self.config.step)
    }
}

impl<A: Bounded> Allocator for Bucketizer<A> {
    const ALIGNMENT: usize = A::ALIGNMENT;
    const SUPPORTS_TRUNCATED_DEALLOCATION: bool = A::SUPPORTS_TRUNCATED_DEALLOCATION;

    #[inline]
    fn allocate(&self, size: usize) -> Block {
        match self.bucket_for(size) {
            Some(index) => self.buckets[index].allocate(size),
            None => Block::empty(),
        }
    }

    fn deallocate(&self, block: Block) {
        if block.is_empty() {
            return;
        }
        match self.bucket_for(block.len()) {
            Some(index) => self.buckets[index].deallocate(block),
            None => warn!(len = block.len(), "block outside bucketizer range dropped"),
        }
    }

    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        if realloc::handled_default(self, block, new_size) {
            return true;
        }
        let (Some(from), Some(to)) = (self.bucket_for(block.len()), self.bucket_for(new_size))
        else {
            return false;
        };
        if from == to {
            return true;
        }
        realloc::with_copy(&self.buckets[from], &self.buckets[to], block, new_size)
    }
}

impl<A: Bounded + OwnershipTestable> OwnershipTestable for Bucketizer<A> {
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        self.bucket_for(block.len())
            .is_some_and(|index| self.buckets[index].owns(block))
    }
}

impl<A: Bounded + BulkResettable> BulkResettable for Bucketizer<A> {
    fn deallocate_all(&self) {
        self.buckets.iter().for_each(|b| b.deallocate_all());
    }
}
