/*!
 * Memory Corruption Detector
 *
 * Surrounds every block with guard values and verifies them when the block
 * is released. A damaged guard means something wrote outside its block;
 * memory safety is already gone at that point, so the default reaction is
 * to panic.
 */

use crate::allocators::AffixAllocator;
use crate::core::limits::{DEFAULT_GUARD_PATTERN, MAX_CORRUPTION_REPORTS};
use crate::core::{
    AllocError, AllocResult, Allocator, Block, BulkResettable, Expandable, GuardSide,
    OwnershipTestable,
};
use crossbeam_queue::ArrayQueue;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Guard value placed before and after user blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Guard<const PATTERN: u64>(u64);

impl<const PATTERN: u64> Default for Guard<PATTERN> {
    #[inline]
    fn default() -> Self {
        Guard(PATTERN)
    }
}

impl<const PATTERN: u64> Guard<PATTERN> {
    /// Overwrites guards of released blocks
    const ERASED: Guard<PATTERN> = Guard(!PATTERN);

    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_intact(self) -> bool {
        self.0 == PATTERN
    }
}

/// Reaction to a damaged guard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionPolicy {
    /// Panic with the diagnostic (the block is not released)
    #[default]
    Panic,
    /// Abort the process
    Abort,
    /// Keep a report, re-arm the guards and continue
    Report,
}

/// One damaged guard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptionReport {
    /// Start of the user block
    pub address: usize,
    pub len: usize,
    pub side: GuardSide,
    pub expected: u64,
    pub found: u64,
}

impl From<&CorruptionReport> for AllocError {
    fn from(report: &CorruptionReport) -> Self {
        AllocError::CorruptionDetected {
            address: report.address,
            side: report.side,
            expected: report.expected,
            found: report.found,
        }
    }
}

/// Guard-checking decorator
///
/// # Example
///
/// ```ignore
/// let detector = MemoryCorruptionDetector::with_policy(SystemAllocator, CorruptionPolicy::Report);
/// let mut block = detector.allocate(16);
/// unsafe { *block.as_ptr().add(16) = 0 };   // one byte too far
/// detector.deallocate(block);
/// assert_eq!(detector.take_reports().len(), 1);
/// ```
pub struct MemoryCorruptionDetector<A, const PATTERN: u64 = DEFAULT_GUARD_PATTERN> {
    inner: AffixAllocator<A, Guard<PATTERN>, Guard<PATTERN>>,
    policy: CorruptionPolicy,
    reports: ArrayQueue<CorruptionReport>,
}

impl<A: Allocator, const PATTERN: u64> MemoryCorruptionDetector<A, PATTERN> {
    /// Detector that panics on corruption
    pub fn new(parent: A) -> Self {
        Self::with_policy(parent, CorruptionPolicy::default())
    }

    pub fn with_policy(parent: A, policy: CorruptionPolicy) -> Self {
        Self {
            inner: AffixAllocator::new(parent),
            policy,
            reports: ArrayQueue::new(MAX_CORRUPTION_REPORTS),
        }
    }

    #[inline]
    pub fn policy(&self) -> CorruptionPolicy {
        self.policy
    }

    #[inline]
    pub fn parent(&self) -> &A {
        self.inner.parent()
    }

    /// Drain retained reports, oldest first
    pub fn take_reports(&self) -> Vec<CorruptionReport> {
        std::iter::from_fn(|| self.reports.pop()).collect()
    }

    /// Verify the guards of a live block without releasing it
    pub fn check(&self, block: &Block) -> AllocResult<()> {
        match self.inspect(block).first() {
            Some(report) => Err(AllocError::from(report)),
            None => Ok(()),
        }
    }

    /// Damaged guards of `block`
    fn inspect(&self, block: &Block) -> Vec<CorruptionReport> {
        if block.is_empty() {
            return Vec::new();
        }
        // Safety: `block` is a live block produced by `inner`
        let (prefix, suffix) = unsafe { (self.inner.prefix(block), self.inner.suffix(block)) };
        [(GuardSide::Prefix, prefix), (GuardSide::Suffix, suffix)]
            .into_iter()
            .filter_map(|(side, guard)| {
                let guard = guard?;
                (!guard.is_intact()).then(|| CorruptionReport {
                    address: block.as_ptr() as usize,
                    len: block.len(),
                    side,
                    expected: PATTERN,
                    found: guard.value(),
                })
            })
            .collect()
    }

    /// Log and react to damaged guards; returns whether the block may be released
    fn enforce(&self, block: &Block) -> bool {
        let reports = self.inspect(block);
        if reports.is_empty() {
            return true;
        }
        for report in &reports {
            error!(
                address = report.address,
                len = report.len,
                side = %report.side,
                expected = report.expected,
                found = report.found,
                "memory corruption detected"
            );
        }
        match self.policy {
            CorruptionPolicy::Panic => panic!("{}", AllocError::from(&reports[0])),
            CorruptionPolicy::Abort => std::process::abort(),
            CorruptionPolicy::Report => {
                for report in reports {
                    self.reports.force_push(report);
                }
                // Re-arm so the same damage is reported once
                self.inner.write_prefix(block, Guard::default());
                self.inner.write_suffix(block, Guard::default());
                true
            }
        }
    }
}

impl<A: Allocator + Default, const PATTERN: u64> Default for MemoryCorruptionDetector<A, PATTERN> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A, const PATTERN: u64> std::fmt::Debug for MemoryCorruptionDetector<A, PATTERN> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCorruptionDetector")
            .field("pattern", &format_args!("0x{PATTERN:x}"))
            .field("policy", &self.policy)
            .field("pending_reports", &self.reports.len())
            .finish()
    }
}

impl<A: Allocator, const PATTERN: u64> Allocator for MemoryCorruptionDetector<A, PATTERN> {
    const ALIGNMENT: usize = AffixAllocator::<A, Guard<PATTERN>, Guard<PATTERN>>::ALIGNMENT;

    #[inline]
    fn allocate(&self, size: usize) -> Block {
        self.inner.allocate(size)
    }

    fn deallocate(&self, block: Block) {
        if block.is_empty() || !self.enforce(&block) {
            return;
        }
        self.inner.write_prefix(&block, Guard::ERASED);
        self.inner.write_suffix(&block, Guard::ERASED);
        self.inner.deallocate(block);
    }

    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        if !self.enforce(block) {
            return false;
        }
        self.inner.reallocate(block, new_size)
    }
}

impl<A: OwnershipTestable, const PATTERN: u64> OwnershipTestable
    for MemoryCorruptionDetector<A, PATTERN>
{
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        self.inner.owns(block)
    }
}

impl<A: Expandable, const PATTERN: u64> Expandable for MemoryCorruptionDetector<A, PATTERN> {
    fn expand(&self, block: &mut Block, delta: usize) -> bool {
        if !self.enforce(block) {
            return false;
        }
        self.inner.expand(block, delta)
    }
}

impl<A: BulkResettable, const PATTERN: u64> BulkResettable
    for MemoryCorruptionDetector<A, PATTERN>
{
    #[inline]
    fn deallocate_all(&self) {
        self.inner.deallocate_all()
    }
}
