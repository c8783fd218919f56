/*!
 * Shared Policy Tests
 * Concurrent callers never receive overlapping live blocks
 */

use compose_alloc::{
    Allocator, AllocatorWithStats, Block, FreeListConfig, HeapConfig, OwnershipTestable, Shared,
    SharedCascadingAllocators, SharedFreeList, SharedHeap, SystemAllocator,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Barrier;
use std::thread;

const THREADS: usize = 8;
const BLOCKS_PER_THREAD: usize = 32;

/// Run `THREADS` workers that each hold `BLOCKS_PER_THREAD` live blocks at
/// the same time, then check every recorded range is disjoint
fn assert_disjoint_under_contention<A>(allocator: &A, size: usize)
where
    A: Allocator + Sync,
{
    let ranges = Mutex::new(Vec::with_capacity(THREADS * BLOCKS_PER_THREAD));
    let all_live = Barrier::new(THREADS);

    thread::scope(|scope| {
        for tag in 0..THREADS {
            let ranges = &ranges;
            let all_live = &all_live;
            scope.spawn(move || {
                let mut blocks: Vec<Block> =
                    (0..BLOCKS_PER_THREAD).map(|_| allocator.allocate(size)).collect();
                for block in blocks.iter_mut() {
                    assert!(!block.is_empty());
                    unsafe { block.as_mut_slice().fill(tag as u8) };
                    let start = block.as_ptr() as usize;
                    ranges.lock().push((start, start + block.len()));
                }

                all_live.wait();
                for block in &blocks {
                    assert!(unsafe { block.as_slice() }.iter().all(|&b| b == tag as u8));
                }
                all_live.wait();

                for block in blocks {
                    allocator.deallocate(block);
                }
            });
        }
    });

    let mut ranges = ranges.into_inner();
    assert_eq!(ranges.len(), THREADS * BLOCKS_PER_THREAD);
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
    }
}

#[test]
fn test_shared_free_list() {
    let list: SharedFreeList<SystemAllocator> =
        SharedFreeList::new(SystemAllocator, FreeListConfig::new(1, 64).with_pool_size(64))
            .unwrap();
    assert_disjoint_under_contention(&list, 48);
    assert!(list.pooled() <= list.pool_capacity());
    // A second round is served at least partly from the pool
    assert_disjoint_under_contention(&list, 64);
}

#[test]
fn test_shared_free_list_batched() {
    let config = FreeListConfig::new(16, 16).with_batch_allocations(8);
    let list: SharedFreeList<SystemAllocator> = SharedFreeList::new(SystemAllocator, config).unwrap();
    assert_disjoint_under_contention(&list, 16);
}

#[test]
fn test_shared_heap() {
    let heap: SharedHeap<SystemAllocator> =
        SharedHeap::new(SystemAllocator, HeapConfig::new(64 * 1024, 8)).unwrap();
    assert_disjoint_under_contention(&heap, 100);
    assert!(heap.chunks_in_use() >= 1);
}

#[test]
fn test_shared_cascading_allocators() {
    let cascade: SharedCascadingAllocators<SharedHeap<SystemAllocator>> =
        SharedCascadingAllocators::new(|| {
            SharedHeap::new(SystemAllocator, HeapConfig::single_chunk(4096))
                .expect("single chunk config is valid")
        });
    assert_disjoint_under_contention(&cascade, 200);
    assert!(cascade.instance_count() > 1);
}

#[test]
fn test_shared_cascading_ownership_from_other_threads() {
    let cascade: SharedCascadingAllocators<SharedHeap<SystemAllocator>> =
        SharedCascadingAllocators::new(|| {
            SharedHeap::new(SystemAllocator, HeapConfig::single_chunk(1024))
                .expect("single chunk config is valid")
        });
    let blocks: Vec<Block> = (0..16).map(|_| cascade.allocate(256)).collect();

    thread::scope(|scope| {
        for chunk in blocks.chunks(4) {
            let cascade = &cascade;
            scope.spawn(move || {
                for block in chunk {
                    assert!(cascade.owns(block));
                }
            });
        }
    });

    for block in blocks {
        cascade.deallocate(block);
    }
}

#[test]
fn test_shared_stats_counts_every_call() {
    let stats: AllocatorWithStats<SystemAllocator, Shared> =
        AllocatorWithStats::new(SystemAllocator);
    assert_disjoint_under_contention(&stats, 24);

    let snapshot = stats.snapshot();
    let total = (THREADS * BLOCKS_PER_THREAD) as u64;
    assert_eq!(snapshot.num_allocate, total);
    assert_eq!(snapshot.num_deallocate, total);
    assert_eq!(snapshot.bytes_allocated, total * 24);
    assert_eq!(snapshot.live_allocations, 0);
}
