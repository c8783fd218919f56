/*!
 * Composable Allocators
 * Small allocator policies that nest into purpose-built allocators
 *
 * Every policy implements [`Allocator`] and, where it can, the capability
 * traits [`OwnershipTestable`], [`Expandable`] and [`BulkResettable`].
 * Combinators hold their children by value and only expose a capability when
 * the children provide it, so an unsupported composition fails to compile.
 *
 * Allocation failure is signalled by the empty [`Block`], never by a panic.
 */

pub mod allocators;
pub mod core;
pub mod instrumentation;

// Re-exports
pub use crate::allocators::{
    AffixAllocator, AlignedSystemAllocator, Bucketizer, BucketizerConfig, CascadingAllocators,
    FallbackAllocator, FreeList, FreeListConfig, Heap, HeapConfig, NullAllocator, Segregator,
    SharedCascadingAllocators, SharedFreeList, SharedHeap, StackAllocator, SystemAllocator,
};
pub use crate::core::{
    AllocError, AllocResult, Allocator, Block, Bounded, BulkResettable, Expandable, GuardSide,
    Local, OwnershipTestable, Shared, SharingMode, Tunable,
};
pub use crate::instrumentation::{
    AllocationRecord, AllocatorWithStats, CorruptionPolicy, CorruptionReport,
    MemoryCorruptionDetector, StatsOptions, StatsSnapshot,
};
