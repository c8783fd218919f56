/*!
 * Stats Options
 * Selects which counters and per-allocation details are collected
 */

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Collection switches for [`AllocatorWithStats`](super::AllocatorWithStats)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StatsOptions: u32 {
        /// Calls to `owns`
        const NUM_OWNS = 1 << 0;
        /// Calls to `allocate`
        const NUM_ALLOCATE = 1 << 1;
        /// Successful allocations
        const NUM_ALLOCATE_OK = 1 << 2;
        /// Calls to `expand`
        const NUM_EXPAND = 1 << 3;
        /// Successful expansions
        const NUM_EXPAND_OK = 1 << 4;
        /// Calls to `reallocate`
        const NUM_REALLOCATE = 1 << 5;
        /// Successful reallocations
        const NUM_REALLOCATE_OK = 1 << 6;
        /// Reallocations that kept the address
        const NUM_REALLOCATE_IN_PLACE = 1 << 7;
        /// Calls to `deallocate`
        const NUM_DEALLOCATE = 1 << 8;
        /// Calls to `deallocate_all`
        const NUM_DEALLOCATE_ALL = 1 << 9;

        const BYTES_ALLOCATED = 1 << 10;
        const BYTES_DEALLOCATED = 1 << 11;
        /// Growth through `expand` or in-place `reallocate`
        const BYTES_EXPANDED = 1 << 12;
        /// Shrinking through in-place `reallocate`
        const BYTES_CONTRACTED = 1 << 13;
        /// Bytes copied by moving reallocations
        const BYTES_MOVED = 1 << 14;
        /// Bytes handed out beyond what was requested
        const BYTES_SLACK = 1 << 15;
        /// Peak of live bytes
        const BYTES_HIGH_TIDE = 1 << 16;

        /// Requested size per allocation
        const CALLER_SIZE = 1 << 17;
        /// File, line, column and module of the allocating call
        const CALLER_LOCATION = 1 << 18;
        /// Wall-clock time of the allocation
        const CALLER_TIME = 1 << 19;

        const NUM_ALL = (1 << 10) - 1;
        const BYTES_ALL = ((1 << 17) - 1) & !((1 << 10) - 1);
        const CALLER_ALL = Self::CALLER_SIZE.bits() | Self::CALLER_LOCATION.bits() | Self::CALLER_TIME.bits();
        const ALL = Self::NUM_ALL.bits() | Self::BYTES_ALL.bits() | Self::CALLER_ALL.bits();
    }
}

impl Default for StatsOptions {
    fn default() -> Self {
        StatsOptions::ALL
    }
}

impl StatsOptions {
    /// Whether per-allocation records are kept
    #[inline]
    pub const fn tracks_callers(&self) -> bool {
        self.intersects(StatsOptions::CALLER_ALL)
    }
}
