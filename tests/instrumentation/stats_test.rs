/*!
 * Stats Tests
 * Counters and records agree with the calls that were made
 */

use compose_alloc::{
    Allocator, AllocatorWithStats, Block, BulkResettable, Expandable, FreeList, FreeListConfig,
    Heap, HeapConfig, OwnershipTestable, StackAllocator, StatsOptions, StatsSnapshot,
    SystemAllocator,
};
use pretty_assertions::assert_eq;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_counter_fidelity() {
    init_tracing();
    let stats: AllocatorWithStats<SystemAllocator> = AllocatorWithStats::new(SystemAllocator);

    let sizes = [10usize, 20, 30, 40];
    let mut blocks: Vec<Block> = sizes.iter().map(|&n| stats.allocate(n)).collect();
    assert!(stats.allocate(0).is_empty());

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.num_allocate, 5);
    assert_eq!(snapshot.num_allocate_ok, 4);
    assert_eq!(snapshot.bytes_allocated, 100);
    assert_eq!(snapshot.bytes_high_tide, 100);
    assert_eq!(snapshot.bytes_slack, 0);
    assert_eq!(snapshot.live_allocations, 4);

    stats.deallocate(blocks.remove(1));
    stats.deallocate(blocks.remove(0));
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.num_deallocate, 2);
    assert_eq!(snapshot.bytes_deallocated, 30);
    assert_eq!(snapshot.bytes_high_tide, 100);

    // Newest first
    let recorded: Vec<Option<usize>> = stats.allocations().iter().map(|r| r.size).collect();
    assert_eq!(recorded, vec![Some(40), Some(30)]);

    for block in blocks {
        stats.deallocate(block);
    }
    assert_eq!(stats.live_allocations(), 0);
}

#[test]
fn test_slack_follows_live_blocks() {
    let stats: AllocatorWithStats<StackAllocator<1024>> =
        AllocatorWithStats::new(StackAllocator::new());
    let a = stats.allocate(100);
    assert_eq!(a.len(), 112);
    assert_eq!(stats.snapshot().bytes_slack, 12);

    let b = stats.allocate(1);
    assert_eq!(stats.snapshot().bytes_slack, 12 + 15);

    stats.deallocate(b);
    stats.deallocate(a);
    assert_eq!(stats.snapshot().bytes_slack, 0);
}

#[test]
fn test_disabled_counters_stay_zero() {
    let stats: AllocatorWithStats<SystemAllocator> =
        AllocatorWithStats::with_options(SystemAllocator, StatsOptions::NUM_ALLOCATE);
    let block = stats.allocate(64);
    stats.deallocate(block);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.num_allocate, 1);
    assert_eq!(snapshot.num_allocate_ok, 0);
    assert_eq!(snapshot.num_deallocate, 0);
    assert_eq!(snapshot.bytes_allocated, 0);
    assert_eq!(snapshot.options, StatsOptions::NUM_ALLOCATE);
}

#[test]
fn test_caller_options_select_fields() {
    let stats: AllocatorWithStats<SystemAllocator> =
        AllocatorWithStats::with_options(SystemAllocator, StatsOptions::CALLER_SIZE);
    let block = stats.allocate(12);

    let records = stats.allocations();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].size, Some(12));
    assert_eq!(records[0].file, None);
    assert_eq!(records[0].line, None);
    assert_eq!(records[0].timestamp, None);
    stats.deallocate(block);
}

#[test]
fn test_tracked_allocate_captures_call_site() {
    let stats: AllocatorWithStats<SystemAllocator> = AllocatorWithStats::new(SystemAllocator);
    let line = line!() + 1;
    let block = compose_alloc::tracked_allocate!(stats, 32);

    let record = &stats.allocations()[0];
    assert_eq!(record.line, Some(line));
    assert_eq!(record.file, Some(file!()));
    assert_eq!(record.module, Some(module_path!()));
    stats.deallocate(block);
}

#[test]
fn test_expand_and_owns_are_counted() {
    let heap = Heap::new(SystemAllocator, HeapConfig::new(1024, 1)).unwrap();
    let stats: AllocatorWithStats<Heap<SystemAllocator>> = AllocatorWithStats::new(heap);

    let mut block = stats.allocate(32);
    assert!(stats.owns(&block));
    assert!(stats.expand(&mut block, 16));
    assert_eq!(block.len(), 48);
    assert!(!stats.expand(&mut block, 4096));

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.num_owns, 1);
    assert_eq!(snapshot.num_expand, 2);
    assert_eq!(snapshot.num_expand_ok, 1);
    assert_eq!(snapshot.bytes_expanded, 16);
    stats.deallocate(block);
}

#[test]
fn test_expand_from_empty_is_tracked_allocation() {
    let heap = Heap::new(SystemAllocator, HeapConfig::new(1024, 1)).unwrap();
    let stats: AllocatorWithStats<Heap<SystemAllocator>> = AllocatorWithStats::new(heap);

    let mut block = Block::empty();
    let line = line!() + 1;
    assert!(stats.expand(&mut block, 24));
    assert_eq!(block.len(), 32);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.num_expand, 1);
    assert_eq!(snapshot.num_expand_ok, 1);
    assert_eq!(snapshot.num_allocate_ok, 1);
    assert_eq!(snapshot.bytes_slack, 8);
    assert_eq!(snapshot.live_allocations, 1);
    let records = stats.allocations();
    assert_eq!(records[0].size, Some(24));
    assert_eq!(records[0].line, Some(line));

    stats.deallocate(block);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.num_deallocate, 1);
    assert_eq!(snapshot.bytes_slack, 0);
    assert_eq!(snapshot.live_allocations, 0);
    assert_eq!(stats.parent().used(), 0);
}

#[test]
fn test_deallocate_all_resets_live_state() {
    let list = FreeList::new(SystemAllocator, FreeListConfig::new(1, 32)).unwrap();
    let stats: AllocatorWithStats<FreeList<SystemAllocator>> = AllocatorWithStats::new(list);
    let a = stats.allocate(8);
    stats.deallocate(a);
    let _b = stats.allocate(8);

    stats.deallocate_all();
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.num_deallocate_all, 1);
    assert_eq!(snapshot.live_allocations, 0);
    assert_eq!(stats.parent().pooled(), 0);
}

#[test]
fn test_snapshot_serializes() {
    let stats: AllocatorWithStats<SystemAllocator> = AllocatorWithStats::new(SystemAllocator);
    let block = stats.allocate(8);
    stats.deallocate(block);

    let snapshot = stats.snapshot();
    let json = serde_json::to_string(&snapshot).unwrap();
    let parsed: StatsSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, snapshot);

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["num_allocate"], 1);
    assert_eq!(value["bytes_deallocated"], 8);
}
