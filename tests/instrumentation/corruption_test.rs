/*!
 * Corruption Detector Tests
 * Every write into a guard is caught on release, whatever the block size
 */

use compose_alloc::{
    AllocError, Allocator, CorruptionPolicy, GuardSide, Heap, HeapConfig,
    MemoryCorruptionDetector, StackAllocator, SystemAllocator,
};
use pretty_assertions::assert_eq;
use std::mem::size_of;

type Detector = MemoryCorruptionDetector<SystemAllocator>;

fn reporting() -> Detector {
    MemoryCorruptionDetector::with_policy(SystemAllocator, CorruptionPolicy::Report)
}

#[test]
fn test_every_overrun_byte_is_detected() {
    let detector = reporting();
    for size in [1usize, 7, 16, 33, 100, 4096] {
        for offset in 0..size_of::<u64>() {
            let block = detector.allocate(size);
            unsafe { *block.end().add(offset) ^= 0xFF };
            detector.deallocate(block);

            let reports = detector.take_reports();
            assert_eq!(reports.len(), 1, "size {size}, offset {offset}");
            assert_eq!(reports[0].side, GuardSide::Suffix);
            assert_eq!(reports[0].len, size);
        }
    }
}

#[test]
fn test_every_underrun_byte_is_detected() {
    let detector = reporting();
    for size in [1usize, 24, 512] {
        for offset in 1..=size_of::<u64>() {
            let block = detector.allocate(size);
            unsafe { *block.as_ptr().sub(offset) ^= 0xFF };
            detector.deallocate(block);

            let reports = detector.take_reports();
            assert_eq!(reports.len(), 1, "size {size}, offset {offset}");
            assert_eq!(reports[0].side, GuardSide::Prefix);
        }
    }
}

#[test]
fn test_both_sides_reported() {
    let detector = reporting();
    let block = detector.allocate(10);
    unsafe {
        *block.as_ptr().sub(1) = 0;
        *block.end() = 0;
    }
    detector.deallocate(block);
    let sides: Vec<GuardSide> = detector.take_reports().iter().map(|r| r.side).collect();
    assert_eq!(sides, vec![GuardSide::Prefix, GuardSide::Suffix]);
}

#[test]
fn test_in_bounds_writes_are_clean() {
    let detector = reporting();
    let mut block = detector.allocate(64);
    unsafe { block.as_mut_slice().fill(0xFF) };
    assert!(detector.check(&block).is_ok());
    detector.deallocate(block);
    assert!(detector.take_reports().is_empty());
}

#[test]
fn test_check_reports_diagnostic() {
    let detector = reporting();
    let block = detector.allocate(16);
    unsafe { *block.end() = 0x42 };

    match detector.check(&block) {
        Err(AllocError::CorruptionDetected {
            address,
            side,
            expected,
            found,
        }) => {
            assert_eq!(address, block.as_ptr() as usize);
            assert_eq!(side, GuardSide::Suffix);
            assert_ne!(expected, found);
        }
        other => panic!("expected corruption, got {other:?}"),
    }
    detector.deallocate(block);
}

#[test]
fn test_reallocate_reports_then_proceeds() {
    let detector = reporting();
    let mut block = detector.allocate(16);
    unsafe { *block.end() = 0 };
    // Report policy lets the resize go ahead once the damage is recorded
    assert!(detector.reallocate(&mut block, 64));
    assert_eq!(detector.take_reports().len(), 1);
    assert!(detector.check(&block).is_ok());
    detector.deallocate(block);
}

#[test]
#[should_panic(expected = "Memory corruption detected")]
fn test_panic_policy() {
    let detector: Detector = MemoryCorruptionDetector::new(SystemAllocator);
    let block = detector.allocate(32);
    unsafe { *block.as_ptr().sub(2) = 0 };
    detector.deallocate(block);
}

#[test]
fn test_detector_over_regions() {
    let stack: MemoryCorruptionDetector<StackAllocator<1024>> =
        MemoryCorruptionDetector::with_policy(StackAllocator::new(), CorruptionPolicy::Report);
    let block = stack.allocate(40);
    unsafe { *block.end().add(3) = 1 };
    stack.deallocate(block);
    assert_eq!(stack.take_reports().len(), 1);
    assert_eq!(stack.parent().used(), 0);

    let heap: MemoryCorruptionDetector<Heap<SystemAllocator>> = MemoryCorruptionDetector::with_policy(
        Heap::new(SystemAllocator, HeapConfig::new(1024, 1)).unwrap(),
        CorruptionPolicy::Report,
    );
    let block = heap.allocate(100);
    assert!(heap.check(&block).is_ok());
    heap.deallocate(block);
    assert!(heap.take_reports().is_empty());
}

#[test]
fn test_policy_serializes() {
    let json = serde_json::to_string(&CorruptionPolicy::Report).unwrap();
    assert_eq!(json, "\"report\"");
    let policy: CorruptionPolicy = serde_json::from_str("\"abort\"").unwrap();
    assert_eq!(policy, CorruptionPolicy::Abort);
}
