/*!
 * Allocator Policies
 *
 * Leaves, combinators, pools, chunked and region allocators. Compose them by
 * nesting values:
 *
 * ```ignore
 * type Small = FreeList<SystemAllocator>;
 * type Composed = Segregator<Small, FallbackAllocator<Heap<SystemAllocator>, SystemAllocator>>;
 * ```
 */

pub mod affix;
pub mod bucketizer;
pub mod cascading;
pub mod fallback;
pub mod freelist;
pub mod heap;
pub mod segregator;
pub mod stack;
pub mod system;

pub use affix::AffixAllocator;
pub use bucketizer::{Bucketizer, BucketizerConfig};
pub use cascading::{CascadingAllocators, CascadingAllocatorsBase, SharedCascadingAllocators};
pub use fallback::FallbackAllocator;
pub use freelist::{FreeList, FreeListBase, FreeListConfig, SharedFreeList};
pub use heap::{Heap, HeapBase, HeapConfig, SharedHeap};
pub use segregator::Segregator;
pub use stack::StackAllocator;
pub use system::{AlignedSystemAllocator, NullAllocator, SystemAllocator};
