/*!
 * Pool Tests
 * Free lists serve repeat requests without touching their parent, and
 * bucketizers route every size to the bucket that serves it
 */

use compose_alloc::{
    Allocator, Block, Bucketizer, BucketizerConfig, BulkResettable, FreeList, FreeListConfig,
    OwnershipTestable, SystemAllocator,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::cell::Cell;

/// System allocator that counts parent traffic
#[derive(Debug, Default)]
struct CountingAllocator {
    allocations: Cell<usize>,
    deallocations: Cell<usize>,
}

impl Allocator for CountingAllocator {
    fn allocate(&self, size: usize) -> Block {
        self.allocations.set(self.allocations.get() + 1);
        SystemAllocator.allocate(size)
    }

    fn deallocate(&self, block: Block) {
        if !block.is_empty() {
            self.deallocations.set(self.deallocations.get() + 1);
        }
        SystemAllocator.deallocate(block)
    }
}

#[test]
fn test_pool_reuse_skips_parent() {
    let list = FreeList::new(CountingAllocator::default(), FreeListConfig::new(32, 64)).unwrap();

    let first = list.allocate(40);
    assert_eq!(first.len(), 64);
    let address = first.as_ptr();
    list.deallocate(first);
    assert_eq!(list.pooled(), 1);

    for size in [32, 48, 64] {
        let again = list.allocate(size);
        assert_eq!(again.as_ptr(), address);
        list.deallocate(again);
    }
    assert_eq!(list.parent().allocations.get(), 1);
    assert_eq!(list.parent().deallocations.get(), 0);
}

#[test]
fn test_pool_capacity_overflow_goes_to_parent() {
    let config = FreeListConfig::new(16, 16).with_pool_size(2);
    let list = FreeList::new(CountingAllocator::default(), config).unwrap();

    let blocks: Vec<Block> = (0..4).map(|_| list.allocate(16)).collect();
    for block in blocks {
        list.deallocate(block);
    }
    assert_eq!(list.pooled(), 2);
    assert_eq!(list.parent().deallocations.get(), 2);

    list.deallocate_all();
    assert_eq!(list.pooled(), 0);
    assert_eq!(list.parent().deallocations.get(), 4);
}

#[test]
fn test_batch_refill() {
    let config = FreeListConfig::new(8, 32).with_batch_allocations(4);
    let list = FreeList::new(CountingAllocator::default(), config).unwrap();

    let block = list.allocate(10);
    assert_eq!(list.parent().allocations.get(), 4);
    assert_eq!(list.pooled(), 3);

    let rest: Vec<Block> = (0..3).map(|_| list.allocate(32)).collect();
    assert_eq!(list.parent().allocations.get(), 4);

    list.deallocate(block);
    for block in rest {
        list.deallocate(block);
    }
}

#[test]
fn test_out_of_range_requests_fail() {
    let list = FreeList::new(SystemAllocator, FreeListConfig::new(32, 64)).unwrap();
    assert!(list.allocate(31).is_empty());
    assert!(list.allocate(65).is_empty());
    assert!(list.allocate(0).is_empty());
}

#[test]
fn test_drop_returns_pool_to_parent() {
    let parent = CountingAllocator::default();
    {
        let list = FreeList::new(&parent, FreeListConfig::new(1, 16)).unwrap();
        let blocks: Vec<Block> = (0..3).map(|_| list.allocate(16)).collect();
        for block in blocks {
            list.deallocate(block);
        }
    }
    assert_eq!(parent.allocations.get(), 3);
    assert_eq!(parent.deallocations.get(), 3);
}

fn buckets() -> Bucketizer<FreeList<SystemAllocator>> {
    Bucketizer::with_factory(BucketizerConfig::new(1, 512, 64), || {
        FreeList::deferred(SystemAllocator)
    })
    .unwrap()
}

#[test]
fn test_bucketizer_rejects_bad_config() {
    assert!(BucketizerConfig::new(0, 64, 16).validate().is_err());
    assert!(BucketizerConfig::new(1, 64, 0).validate().is_err());
    assert!(BucketizerConfig::new(1, 60, 16).validate().is_err());
    assert!(BucketizerConfig::new(17, 144, 16).validate().is_ok());
    assert_eq!(BucketizerConfig::new(17, 144, 16).bucket_count(), 8);
}

#[test]
fn test_bucketizer_reset_empties_every_pool() {
    let b = buckets();
    let blocks: Vec<Block> = [10, 100, 200, 500].iter().map(|&n| b.allocate(n)).collect();
    for block in blocks {
        b.deallocate(block);
    }
    let pooled: usize = (0..b.bucket_count()).filter_map(|i| b.bucket(i)).map(|l| l.pooled()).sum();
    assert_eq!(pooled, 4);

    b.deallocate_all();
    let pooled: usize = (0..b.bucket_count()).filter_map(|i| b.bucket(i)).map(|l| l.pooled()).sum();
    assert_eq!(pooled, 0);
}

proptest! {
    #[test]
    fn test_bucketizer_routes_to_serving_bucket(size in 1usize..=512) {
        let b = buckets();
        let index = b.bucket_for(size).unwrap();
        let (lower, upper) = b.bucket_bounds(index).unwrap();
        prop_assert!(lower <= size && size <= upper);

        let block = b.allocate(size);
        prop_assert_eq!(block.len(), upper);
        prop_assert!(b.bucket(index).unwrap().owns(&block));
        for other in (0..b.bucket_count()).filter(|&i| i != index) {
            prop_assert!(!b.bucket(other).unwrap().owns(&block));
        }
        b.deallocate(block);
        prop_assert_eq!(b.bucket(index).unwrap().pooled(), 1);
    }

    #[test]
    fn test_bucketizer_rejects_out_of_range(size in 513usize..100_000) {
        let b = buckets();
        prop_assert!(b.allocate(size).is_empty());
        prop_assert!(b.bucket_for(size).is_none());
    }
}
