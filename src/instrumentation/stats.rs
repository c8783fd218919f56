/*!
 * Allocator With Stats
 *
 * Counts operations and bytes passing through a policy and, optionally,
 * keeps an audit trail of live allocations.
 *
 * ## Per-allocation records
 *
 * When any `CALLER_*` option is set, blocks are allocated through an
 * [`AffixAllocator`] whose prefix holds the slot index of the block's record.
 * Without caller options the parent is called directly and blocks carry no
 * overhead.
 *
 * Call sites are captured with `#[track_caller]`, so the recorded location is
 * the line that called `allocate` on this wrapper. Use
 * [`tracked_allocate!`](crate::tracked_allocate) to also record the module.
 */

use super::options::StatsOptions;
use super::records::{AllocationRecord, RecordSlab, RecordSlot};
use crate::allocators::AffixAllocator;
use crate::core::sync::Lockable;
use crate::core::{
    Allocator, Block, BulkResettable, Expandable, Local, OwnershipTestable, SharingMode,
};
use serde::{Deserialize, Serialize};
use std::panic::Location;
use std::time::SystemTime;

/// Counter values at one point in time
///
/// Counters whose option is off stay zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub options: StatsOptions,
    pub num_owns: u64,
    pub num_allocate: u64,
    pub num_allocate_ok: u64,
    pub num_expand: u64,
    pub num_expand_ok: u64,
    pub num_reallocate: u64,
    pub num_reallocate_ok: u64,
    pub num_reallocate_in_place: u64,
    pub num_deallocate: u64,
    pub num_deallocate_all: u64,
    pub bytes_allocated: u64,
    pub bytes_deallocated: u64,
    pub bytes_expanded: u64,
    pub bytes_contracted: u64,
    pub bytes_moved: u64,
    pub bytes_slack: u64,
    pub bytes_high_tide: u64,
    /// Allocation records currently linked
    pub live_allocations: usize,
}

#[derive(Debug, Default)]
struct StatsState {
    counters: StatsSnapshot,
    /// Bytes currently handed out, tracked regardless of options
    live_bytes: u64,
    records: RecordSlab,
}

impl StatsState {
    #[inline(always)]
    fn options(&self) -> StatsOptions {
        self.counters.options
    }

    #[inline(always)]
    fn count(&mut self, option: StatsOptions, counter: fn(&mut StatsSnapshot) -> &mut u64, n: u64) {
        if self.options().contains(option) {
            let value = counter(&mut self.counters);
            *value = value.saturating_add(n);
        }
    }

    #[inline]
    fn grow_live(&mut self, n: u64) {
        self.live_bytes = self.live_bytes.saturating_add(n);
        if self.options().contains(StatsOptions::BYTES_HIGH_TIDE)
            && self.live_bytes > self.counters.bytes_high_tide
        {
            self.counters.bytes_high_tide = self.live_bytes;
        }
    }

    #[inline]
    fn shrink_live(&mut self, n: u64) {
        self.live_bytes = self.live_bytes.saturating_sub(n);
    }

    #[inline]
    fn adjust_slack(&mut self, add: usize, remove: usize) {
        if self.options().contains(StatsOptions::BYTES_SLACK) {
            let slack = &mut self.counters.bytes_slack;
            *slack = slack.saturating_add(add as u64).saturating_sub(remove as u64);
        }
    }
}

/// Statistics decorator
///
/// # Example
///
/// ```ignore
/// let stats: AllocatorWithStats<SystemAllocator> = AllocatorWithStats::new(SystemAllocator);
/// let block = tracked_allocate!(stats, 100);
/// assert_eq!(stats.snapshot().num_allocate_ok, 1);
/// assert_eq!(stats.allocations()[0].line, Some(line!() - 2));
/// stats.deallocate(block);
/// ```
pub struct AllocatorWithStats<A, M: SharingMode = Local> {
    inner: AffixAllocator<A, RecordSlot>,
    options: StatsOptions,
    state: M::Lock<StatsState>,
}

impl<A: Allocator, M: SharingMode> AllocatorWithStats<A, M> {
    /// Collect everything
    pub fn new(parent: A) -> Self {
        Self::with_options(parent, StatsOptions::ALL)
    }

    pub fn with_options(parent: A, options: StatsOptions) -> Self {
        Self {
            inner: AffixAllocator::new(parent),
            options,
            state: Lockable::new(StatsState {
                counters: StatsSnapshot {
                    options,
                    ..StatsSnapshot::default()
                },
                ..StatsState::default()
            }),
        }
    }

    #[inline]
    pub fn options(&self) -> StatsOptions {
        self.options
    }

    #[inline]
    pub fn parent(&self) -> &A {
        self.inner.parent()
    }

    /// Copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        self.state.with(|s| StatsSnapshot {
            live_allocations: s.records.len(),
            ..s.counters.clone()
        })
    }

    /// Live allocation records, newest first
    pub fn allocations(&self) -> Vec<AllocationRecord> {
        self.state.with(|s| s.records.iter().cloned().collect())
    }

    /// Number of live allocation records
    pub fn live_allocations(&self) -> usize {
        self.state.with(|s| s.records.len())
    }

    /// Allocate and tag the record with `module`
    #[track_caller]
    pub fn allocate_in(&self, size: usize, module: &'static str) -> Block {
        self.allocate_at(size, Location::caller(), Some(module))
    }

    #[inline(always)]
    fn tracks_callers(&self) -> bool {
        self.options.tracks_callers()
    }

    /// Slot recorded in front of a tracked block
    #[inline]
    fn slot_of(&self, block: &Block) -> Option<RecordSlot> {
        if !self.tracks_callers() || block.is_empty() {
            return None;
        }
        // Safety: tracked blocks were produced by `inner`
        unsafe { self.inner.prefix(block) }.filter(|slot| *slot != RecordSlot::UNTRACKED)
    }

    fn allocate_at(
        &self,
        size: usize,
        location: &'static Location<'static>,
        module: Option<&'static str>,
    ) -> Block {
        let block = if self.tracks_callers() {
            self.inner.allocate(size)
        } else {
            self.inner.parent().allocate(size)
        };

        let options = self.options;
        self.state.with(|s| {
            s.count(StatsOptions::NUM_ALLOCATE, |c| &mut c.num_allocate, 1);
            if block.is_empty() {
                return;
            }
            let len = block.len() as u64;
            s.count(StatsOptions::NUM_ALLOCATE_OK, |c| &mut c.num_allocate_ok, 1);
            s.count(StatsOptions::BYTES_ALLOCATED, |c| &mut c.bytes_allocated, len);
            s.adjust_slack(block.len() - size, 0);
            s.grow_live(len);

            if options.tracks_callers() {
                let at_location = options.contains(StatsOptions::CALLER_LOCATION);
                let record = AllocationRecord {
                    size: options.contains(StatsOptions::CALLER_SIZE).then_some(size),
                    file: at_location.then(|| location.file()),
                    line: at_location.then(|| location.line()),
                    column: at_location.then(|| location.column()),
                    module: module.filter(|_| at_location),
                    timestamp: options
                        .contains(StatsOptions::CALLER_TIME)
                        .then(SystemTime::now),
                };
                let slot = s.records.insert(record, size);
                self.inner.write_prefix(&block, slot);
            }
        });
        block
    }

    fn release(&self, block: Block) {
        if self.tracks_callers() {
            self.inner.deallocate(block);
        } else {
            self.inner.parent().deallocate(block);
        }
    }
}

impl<A: Allocator + Default, M: SharingMode> Default for AllocatorWithStats<A, M> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A, M: SharingMode> std::fmt::Debug for AllocatorWithStats<A, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllocatorWithStats")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<A: Allocator, M: SharingMode> Allocator for AllocatorWithStats<A, M> {
    const ALIGNMENT: usize = AffixAllocator::<A, RecordSlot>::ALIGNMENT;
    const SUPPORTS_TRUNCATED_DEALLOCATION: bool = false;

    #[track_caller]
    fn allocate(&self, size: usize) -> Block {
        self.allocate_at(size, Location::caller(), None)
    }

    fn deallocate(&self, block: Block) {
        let slot = self.slot_of(&block);
        self.state.with(|s| {
            s.count(StatsOptions::NUM_DEALLOCATE, |c| &mut c.num_deallocate, 1);
            if block.is_empty() {
                return;
            }
            let len = block.len() as u64;
            s.count(StatsOptions::BYTES_DEALLOCATED, |c| &mut c.bytes_deallocated, len);
            s.shrink_live(len);
            if let Some((_, requested)) = slot.and_then(|slot| s.records.remove(slot)) {
                s.adjust_slack(0, block.len().saturating_sub(requested));
            }
        });
        self.release(block);
    }

    #[track_caller]
    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        self.state
            .with(|s| s.count(StatsOptions::NUM_REALLOCATE, |c| &mut c.num_reallocate, 1));

        if new_size == 0 {
            self.deallocate(block.take());
            self.state.with(|s| {
                s.count(StatsOptions::NUM_REALLOCATE_OK, |c| &mut c.num_reallocate_ok, 1)
            });
            return true;
        }
        if block.is_empty() {
            *block = self.allocate_at(new_size, Location::caller(), None);
            let ok = !block.is_empty();
            if ok {
                self.state.with(|s| {
                    s.count(StatsOptions::NUM_REALLOCATE_OK, |c| &mut c.num_reallocate_ok, 1)
                });
            }
            return ok;
        }

        let old_ptr = block.as_ptr();
        let old_len = block.len();
        let slot = self.slot_of(block);
        let ok = if self.tracks_callers() {
            self.inner.reallocate(block, new_size)
        } else {
            self.inner.parent().reallocate(block, new_size)
        };
        if !ok {
            return false;
        }

        let new_len = block.len();
        let in_place = block.as_ptr() == old_ptr;
        self.state.with(|s| {
            s.count(StatsOptions::NUM_REALLOCATE_OK, |c| &mut c.num_reallocate_ok, 1);
            if in_place {
                s.count(
                    StatsOptions::NUM_REALLOCATE_IN_PLACE,
                    |c| &mut c.num_reallocate_in_place,
                    1,
                );
                if new_len >= old_len {
                    let delta = (new_len - old_len) as u64;
                    s.count(StatsOptions::BYTES_ALLOCATED, |c| &mut c.bytes_allocated, delta);
                    s.count(StatsOptions::BYTES_EXPANDED, |c| &mut c.bytes_expanded, delta);
                    s.grow_live(delta);
                } else {
                    let delta = (old_len - new_len) as u64;
                    s.count(StatsOptions::BYTES_DEALLOCATED, |c| &mut c.bytes_deallocated, delta);
                    s.count(StatsOptions::BYTES_CONTRACTED, |c| &mut c.bytes_contracted, delta);
                    s.shrink_live(delta);
                }
            } else {
                s.count(StatsOptions::BYTES_ALLOCATED, |c| &mut c.bytes_allocated, new_len as u64);
                s.count(StatsOptions::BYTES_MOVED, |c| &mut c.bytes_moved, old_len as u64);
                s.count(
                    StatsOptions::BYTES_DEALLOCATED,
                    |c| &mut c.bytes_deallocated,
                    old_len as u64,
                );
                s.shrink_live(old_len as u64);
                s.grow_live(new_len as u64);
            }

            if let Some(slot) = slot {
                if let Some(requested) = s.records.requested(slot) {
                    s.adjust_slack(
                        new_len.saturating_sub(new_size),
                        old_len.saturating_sub(requested),
                    );
                    s.records.resize(slot, new_size);
                }
            }
        });
        true
    }
}

impl<A: OwnershipTestable, M: SharingMode> OwnershipTestable for AllocatorWithStats<A, M> {
    fn owns(&self, block: &Block) -> bool {
        self.state
            .with(|s| s.count(StatsOptions::NUM_OWNS, |c| &mut c.num_owns, 1));
        if self.tracks_callers() {
            self.inner.owns(block)
        } else {
            self.inner.parent().owns(block)
        }
    }
}

impl<A: Expandable, M: SharingMode> Expandable for AllocatorWithStats<A, M> {
    #[track_caller]
    fn expand(&self, block: &mut Block, delta: usize) -> bool {
        if block.is_empty() && delta > 0 {
            *block = self.allocate_at(delta, Location::caller(), None);
            let ok = !block.is_empty();
            self.state.with(|s| {
                s.count(StatsOptions::NUM_EXPAND, |c| &mut c.num_expand, 1);
                if ok {
                    s.count(StatsOptions::NUM_EXPAND_OK, |c| &mut c.num_expand_ok, 1);
                }
            });
            return ok;
        }
        let old_len = block.len();
        let ok = if self.tracks_callers() {
            self.inner.expand(block, delta)
        } else {
            self.inner.parent().expand(block, delta)
        };
        self.state.with(|s| {
            s.count(StatsOptions::NUM_EXPAND, |c| &mut c.num_expand, 1);
            if ok {
                let grown = block.len().saturating_sub(old_len) as u64;
                s.count(StatsOptions::NUM_EXPAND_OK, |c| &mut c.num_expand_ok, 1);
                s.count(StatsOptions::BYTES_EXPANDED, |c| &mut c.bytes_expanded, grown);
                s.count(StatsOptions::BYTES_ALLOCATED, |c| &mut c.bytes_allocated, grown);
                s.grow_live(grown);
                // The caller now asks for `delta` more; any rounding is slack
                if let Some(slot) = self.slot_of(block) {
                    if let Some(requested) = s.records.requested(slot) {
                        s.records.resize(slot, requested.saturating_add(delta));
                        s.adjust_slack((grown as usize).saturating_sub(delta), 0);
                    }
                }
            }
        });
        ok
    }
}

impl<A: BulkResettable, M: SharingMode> BulkResettable for AllocatorWithStats<A, M> {
    fn deallocate_all(&self) {
        if self.tracks_callers() {
            self.inner.deallocate_all();
        } else {
            self.inner.parent().deallocate_all();
        }
        self.state.with(|s| {
            s.count(StatsOptions::NUM_DEALLOCATE_ALL, |c| &mut c.num_deallocate_all, 1);
            s.records.clear();
            s.live_bytes = 0;
            s.counters.bytes_slack = 0;
        });
    }
}

/// Allocate through an [`AllocatorWithStats`], recording the calling module
///
/// ```ignore
/// let block = tracked_allocate!(stats, 64);
/// ```
#[macro_export]
macro_rules! tracked_allocate {
    ($allocator:expr, $size:expr) => {
        $allocator.allocate_in($size, ::std::module_path!())
    };
}
