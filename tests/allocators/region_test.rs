/*!
 * Region Tests
 * Stack, chunked heap and cascading instances: growth, reclaim and reset
 */

use compose_alloc::{
    Allocator, Block, BulkResettable, CascadingAllocators, Expandable, Heap, HeapConfig,
    OwnershipTestable, StackAllocator, SystemAllocator,
};
use pretty_assertions::assert_eq;

#[test]
fn test_stack_lifo_reclaims() {
    let stack = StackAllocator::<1024>::new();
    let a = stack.allocate(100);
    let b = stack.allocate(200);
    let c = stack.allocate(50);
    let used = stack.used();
    assert_eq!(used, a.len() + b.len() + c.len());

    stack.deallocate(c);
    assert_eq!(stack.used(), a.len() + b.len());
    stack.deallocate(b);
    stack.deallocate(a);
    assert_eq!(stack.used(), 0);
    assert_eq!(stack.remaining(), stack.capacity());
}

#[test]
fn test_stack_out_of_order_free_is_deferred() {
    let stack = StackAllocator::<1024>::new();
    let a = stack.allocate(64);
    let b = stack.allocate(64);
    let before = stack.used();

    stack.deallocate(a);
    assert_eq!(stack.used(), before);

    stack.deallocate(b);
    assert!(stack.used() < before);

    stack.deallocate_all();
    assert_eq!(stack.used(), 0);
    assert_eq!(stack.remaining(), stack.capacity());
}

#[test]
fn test_stack_exhaustion_returns_empty() {
    let stack = StackAllocator::<128>::new();
    let a = stack.allocate(128);
    assert_eq!(a.len(), 128);
    assert!(stack.allocate(1).is_empty());
    stack.deallocate(a);
    assert!(!stack.allocate(1).is_empty());
}

#[test]
fn test_stack_expand_only_last_block() {
    let stack = StackAllocator::<512>::new();
    let mut a = stack.allocate(32);
    let mut b = stack.allocate(32);
    assert!(!stack.expand(&mut a, 16));
    assert!(stack.expand(&mut b, 16));
    assert_eq!(b.len(), 48);
    assert!(!stack.expand(&mut b, 1024));
}

#[test]
fn test_heap_materializes_chunks_lazily() {
    let heap = Heap::new(SystemAllocator, HeapConfig::new(256, 4)).unwrap();
    assert_eq!(heap.chunks_in_use(), 0);

    let blocks: Vec<Block> = (0..5).map(|_| heap.allocate(100)).collect();
    // 112-byte slices, two per 256-byte chunk
    assert_eq!(heap.chunks_in_use(), 3);
    assert!(blocks.iter().all(|b| heap.owns(b)));

    assert!(heap.allocate(257).is_empty());

    heap.deallocate_all();
    assert_eq!(heap.chunks_in_use(), 0);
    assert!(!heap.owns(&blocks[0]));
}

#[test]
fn test_heap_budget_exhaustion() {
    let heap = Heap::new(SystemAllocator, HeapConfig::new(128, 2)).unwrap();
    let a = heap.allocate(128);
    let b = heap.allocate(128);
    assert!(!a.is_empty() && !b.is_empty());
    assert!(heap.allocate(16).is_empty());

    heap.deallocate(b);
    assert!(!heap.allocate(16).is_empty());
}

fn cascade(chunk: usize) -> CascadingAllocators<Heap<SystemAllocator>> {
    CascadingAllocators::new(move || {
        Heap::new(SystemAllocator, HeapConfig::single_chunk(chunk))
            .expect("single chunk config is valid")
    })
}

#[test]
fn test_cascading_grows_on_exhaustion() {
    let cascade = cascade(1024);
    assert_eq!(cascade.instance_count(), 1);

    let a = cascade.allocate(512);
    let b = cascade.allocate(512);
    assert_eq!(cascade.instance_count(), 1);

    let c = cascade.allocate(512);
    assert!(!c.is_empty());
    assert_eq!(cascade.instance_count(), 2);

    let instances = cascade.instances();
    assert!(instances[0].owns(&a) && instances[0].owns(&b));
    assert!(instances[1].owns(&c));
    assert!(!instances[0].owns(&c));
}

#[test]
fn test_cascading_refuses_oversized_request() {
    let cascade = cascade(256);
    assert!(cascade.allocate(257).is_empty());
    assert_eq!(cascade.instance_count(), 1);
}

#[test]
fn test_cascading_routes_release_to_owner() {
    let cascade = cascade(256);
    let first = cascade.allocate(256);
    let second = cascade.allocate(256);
    assert_eq!(cascade.instance_count(), 2);

    cascade.deallocate(first);
    assert_eq!(cascade.instances()[0].used(), 0);
    assert_eq!(cascade.instances()[1].used(), 256);

    cascade.deallocate(second);
    assert_eq!(cascade.instances()[1].used(), 0);
}

#[test]
fn test_cascading_reset_keeps_one_instance() {
    let cascade = cascade(128);
    let blocks: Vec<Block> = (0..4).map(|_| cascade.allocate(128)).collect();
    assert_eq!(cascade.instance_count(), 4);
    assert!(blocks.iter().all(|b| cascade.owns(b)));

    cascade.deallocate_all();
    assert_eq!(cascade.instance_count(), 1);
    assert!(!cascade.owns(&blocks[0]));
}
