/*!
 * Allocator Limits and Constants
 *
 * Centralized location for alignments, default pool sizes and guard patterns.
 * Organized by the policy that consumes them.
 *
 * - Performance-relevant constants are marked with [PERF]
 * - Values that leak into memory layout are marked with [LAYOUT]
 */

// =============================================================================
// ALIGNMENT
// =============================================================================

/// Alignment of every block handed out by the system allocator (16 bytes)
/// Matches `max_align_t` on mainstream 64-bit targets
/// [LAYOUT] Affix prefix regions are padded to this so user pointers keep it
pub const DEFAULT_ALIGNMENT: usize = 16;

/// Alignment of the inline buffer backing `StackAllocator` (one cache line)
/// [LAYOUT] Upper bound for the stack allocator's configurable alignment
pub const STACK_BUFFER_ALIGNMENT: usize = 64;

/// Default per-allocation alignment for `StackAllocator`
pub const DEFAULT_STACK_ALIGNMENT: usize = 16;

// =============================================================================
// POOLING
// =============================================================================

/// Default capacity of a free list pool (blocks)
pub const DEFAULT_POOL_SIZE: usize = 1024;

/// Default number of blocks fetched from the parent on a pool miss
/// [PERF] One keeps parent traffic predictable; raise for allocation bursts
pub const DEFAULT_BATCH_ALLOCATIONS: usize = 1;

/// Largest pool the lock-free index stack can address
/// Head words pack a 32-bit index next to a 32-bit ABA tag
pub const MAX_SHARED_POOL_SIZE: usize = (u32::MAX - 1) as usize;

// =============================================================================
// CHUNKED HEAP
// =============================================================================

/// Default chunk size for `Heap` (64KB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default chunk budget for `Heap`
pub const DEFAULT_NUMBER_OF_CHUNKS: usize = 64;

/// Bits per occupancy bitmap word
pub const BITMAP_WORD_BITS: usize = u64::BITS as usize;

// =============================================================================
// INSTRUMENTATION
// =============================================================================

/// Guard pattern written around user blocks by the corruption detector
pub const DEFAULT_GUARD_PATTERN: u64 = 0xDEAD_BEEF_DEAD_BEEF;

/// Number of corruption reports retained before the oldest are dropped
pub const MAX_CORRUPTION_REPORTS: usize = 64;
