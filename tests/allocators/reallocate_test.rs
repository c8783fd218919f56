/*!
 * Reallocate Tests
 * Every policy keeps the leading bytes of a block across a resize
 */

use compose_alloc::{
    AffixAllocator, Allocator, AllocatorWithStats, Block, Bucketizer, BucketizerConfig,
    CascadingAllocators, CorruptionPolicy, FallbackAllocator, FreeList, FreeListConfig, Heap,
    HeapConfig, MemoryCorruptionDetector, Segregator, StackAllocator, SystemAllocator,
};
use pretty_assertions::assert_eq;

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

/// Allocate `from` bytes, fill them, resize to `to` and check the common prefix
fn assert_preserved<A: Allocator>(allocator: &A, from: usize, to: usize) {
    let mut block = allocator.allocate(from);
    assert!(!block.is_empty(), "allocation of {from} bytes failed");
    let expected = pattern(from);
    unsafe { block.as_mut_slice()[..from].copy_from_slice(&expected) };

    assert!(allocator.reallocate(&mut block, to), "resize {from} -> {to} failed");
    assert!(block.len() >= to);
    let kept = from.min(to);
    assert_eq!(unsafe { &block.as_slice()[..kept] }, &expected[..kept]);

    allocator.deallocate(block);
}

fn assert_grow_and_shrink<A: Allocator>(allocator: &A, small: usize, large: usize) {
    assert_preserved(allocator, small, large);
    assert_preserved(allocator, large, small);
}

#[test]
fn test_system() {
    assert_grow_and_shrink(&SystemAllocator, 10, 10_000);
}

#[test]
fn test_stack_last_and_inner_blocks() {
    let stack = StackAllocator::<4096>::new();
    assert_grow_and_shrink(&stack, 40, 400);

    // Block below the top has to move
    let mut below = stack.allocate(32);
    unsafe { below.as_mut_slice().fill(9) };
    let top = stack.allocate(32);
    assert!(stack.reallocate(&mut below, 200));
    assert!(unsafe { below.as_slice()[..32].iter().all(|&b| b == 9) });
    stack.deallocate(below);
    stack.deallocate(top);
}

#[test]
fn test_heap() {
    let heap = Heap::new(SystemAllocator, HeapConfig::new(4096, 2)).unwrap();
    assert_grow_and_shrink(&heap, 20, 2000);
}

#[test]
fn test_free_list_within_range() {
    let list = FreeList::new(SystemAllocator, FreeListConfig::new(16, 64)).unwrap();
    assert_grow_and_shrink(&list, 16, 64);

    let mut block = list.allocate(32);
    assert!(!list.reallocate(&mut block, 65));
    assert_eq!(block.len(), 64);
    list.deallocate(block);
}

#[test]
fn test_segregator_across_threshold() {
    let seg = Segregator::new(StackAllocator::<2048>::new(), SystemAllocator, 256);
    assert_grow_and_shrink(&seg, 100, 1000);
    assert_eq!(seg.small().used(), 0);
}

#[test]
fn test_fallback_spills_to_secondary() {
    let fallback = FallbackAllocator::new(StackAllocator::<256>::new(), SystemAllocator);
    assert_preserved(&fallback, 100, 1024);
    assert_eq!(fallback.primary().used(), 0);
}

#[test]
fn test_bucketizer_between_buckets() {
    let buckets = Bucketizer::with_factory(BucketizerConfig::new(1, 256, 32), || {
        FreeList::deferred(SystemAllocator)
    })
    .unwrap();
    assert_grow_and_shrink(&buckets, 20, 250);
    assert_preserved(&buckets, 20, 30);
}

#[test]
fn test_cascading_moves_between_instances() {
    let cascade = CascadingAllocators::new(|| {
        Heap::new(SystemAllocator, HeapConfig::single_chunk(512)).expect("valid config")
    });
    let _pin = cascade.allocate(256);
    assert_preserved(&cascade, 128, 500);
    assert!(cascade.instance_count() >= 2);
}

#[test]
fn test_affix() {
    let affix: AffixAllocator<SystemAllocator, u64, u32> = AffixAllocator::new(SystemAllocator);
    assert_grow_and_shrink(&affix, 24, 4096);
}

#[test]
fn test_stats() {
    let stats: AllocatorWithStats<SystemAllocator> = AllocatorWithStats::new(SystemAllocator);
    assert_grow_and_shrink(&stats, 8, 800);
    assert_eq!(stats.snapshot().num_reallocate_ok, 2);
    assert_eq!(stats.live_allocations(), 0);
}

#[test]
fn test_corruption_detector() {
    let detector: MemoryCorruptionDetector<SystemAllocator> =
        MemoryCorruptionDetector::with_policy(SystemAllocator, CorruptionPolicy::Report);
    assert_grow_and_shrink(&detector, 16, 1600);

    // Guards follow the block to its new end
    let mut block: Block = detector.allocate(8);
    assert!(detector.reallocate(&mut block, 80));
    assert!(detector.check(&block).is_ok());
    detector.deallocate(block);
    assert!(detector.take_reports().is_empty());
}
