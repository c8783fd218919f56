/*!
 * Chunked Heap
 *
 * Bump allocation inside a fixed budget of fixed-size chunks.
 *
 * ## Design
 *
 * Chunks are requested from the parent lazily, the first time no existing
 * chunk can fit a request, and are tracked in an occupancy bitmap. Each chunk
 * has its own bump cursor; allocation is first-fit across chunks.
 *
 * Chunk base addresses are also published in an array of atomics, so `owns`
 * never touches the lock. Cursor and bitmap mutation is serialized by the
 * sharing mode's lock (a `RefCell` when local, a mutex when shared).
 *
 * ## Reclaiming
 *
 * A freed slice is reclaimed only when it ends at its chunk's cursor, which
 * makes strictly nested alloc/free sequences free of waste. Anything else is
 * recovered by `deallocate_all`, which hands every chunk back to the parent.
 */

use crate::core::limits::{
    BITMAP_WORD_BITS, DEFAULT_ALIGNMENT, DEFAULT_CHUNK_SIZE, DEFAULT_NUMBER_OF_CHUNKS,
};
use crate::core::sync::Lockable;
use crate::core::{
    realloc, round_to_alignment, AllocError, AllocResult, Allocator, Block, BulkResettable,
    Expandable, Local, OwnershipTestable, Shared, SharingMode,
};
use serde::{Deserialize, Serialize};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use tracing::{debug, trace, warn};

/// Heap configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapConfig {
    /// Bytes per chunk, a multiple of the heap alignment
    pub chunk_size: usize,
    /// Maximum number of chunks requested from the parent
    pub number_of_chunks: usize,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            number_of_chunks: DEFAULT_NUMBER_OF_CHUNKS,
        }
    }
}

impl HeapConfig {
    pub const fn new(chunk_size: usize, number_of_chunks: usize) -> Self {
        Self {
            chunk_size,
            number_of_chunks,
        }
    }

    /// A single chunk: the heap behaves like one bounded arena
    pub const fn single_chunk(chunk_size: usize) -> Self {
        Self::new(chunk_size, 1)
    }

    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub const fn with_number_of_chunks(mut self, number_of_chunks: usize) -> Self {
        self.number_of_chunks = number_of_chunks;
        self
    }

    /// Total bytes the heap can hand out
    pub const fn capacity(&self) -> usize {
        self.chunk_size.saturating_mul(self.number_of_chunks)
    }

    pub fn validate(&self) -> AllocResult<()> {
        if self.chunk_size == 0 || self.chunk_size % DEFAULT_ALIGNMENT != 0 {
            return Err(AllocError::InvalidConfig(format!(
                "chunk_size {} must be a non-zero multiple of {}",
                self.chunk_size, DEFAULT_ALIGNMENT
            )));
        }
        if self.number_of_chunks == 0 {
            return Err(AllocError::InvalidConfig(
                "number_of_chunks must be at least 1".into(),
            ));
        }
        if self.chunk_size.checked_mul(self.number_of_chunks).is_none() {
            return Err(AllocError::InvalidConfig("heap capacity overflows".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Chunk {
    /// Memory from the parent, empty while not materialized
    memory: Block,
    cursor: usize,
}

#[derive(Debug)]
struct HeapState {
    chunks: Vec<Chunk>,
    occupancy: Vec<u64>,
}

impl HeapState {
    fn new(number_of_chunks: usize) -> Self {
        Self {
            chunks: (0..number_of_chunks).map(|_| Chunk::default()).collect(),
            occupancy: vec![0; number_of_chunks.div_ceil(BITMAP_WORD_BITS)],
        }
    }

    #[inline]
    fn first_vacant(&self) -> Option<usize> {
        self.occupancy.iter().enumerate().find_map(|(word_index, word)| {
            let bit = (!word).trailing_zeros() as usize;
            let index = word_index * BITMAP_WORD_BITS + bit;
            (bit < BITMAP_WORD_BITS && index < self.chunks.len()).then_some(index)
        })
    }

    #[inline]
    fn mark(&mut self, index: usize, occupied: bool) {
        let word = &mut self.occupancy[index / BITMAP_WORD_BITS];
        let mask = 1u64 << (index % BITMAP_WORD_BITS);
        if occupied {
            *word |= mask;
        } else {
            *word &= !mask;
        }
    }

    fn chunks_in_use(&self) -> usize {
        self.occupancy.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Chunk containing `addr`, with the offset of `addr` inside it
    #[inline]
    fn locate(&mut self, addr: *const u8, chunk_size: usize) -> Option<(&mut Chunk, usize)> {
        let addr = addr as usize;
        self.chunks.iter_mut().find_map(|chunk| {
            let base = chunk.memory.as_ptr() as usize;
            let inside = !chunk.memory.is_empty() && addr >= base && addr - base < chunk_size;
            inside.then(|| (chunk, addr - base))
        })
    }
}

/// Chunked bump allocator
///
/// Use the [`Heap`] and [`SharedHeap`] aliases.
///
/// # Performance
///
/// - **Allocate**: first-fit scan over chunks, then a cursor bump
/// - **Owns**: lock-free scan of published chunk bases
///
/// # Example
///
/// ```ignore
/// let heap = Heap::new(SystemAllocator, HeapConfig::new(4096, 8))?;
/// let a = heap.allocate(100);  // 112 bytes, first chunk materialized
/// heap.deallocate(a);          // most recent slice: cursor rewinds
/// ```
pub struct HeapBase<A: Allocator, M: SharingMode> {
    parent: A,
    config: HeapConfig,
    bases: Box<[AtomicPtr<u8>]>,
    state: M::Lock<HeapState>,
}

/// Single-threaded chunked heap
pub type Heap<A> = HeapBase<A, Local>;

/// Chunked heap safe for concurrent use
pub type SharedHeap<A> = HeapBase<A, Shared>;

impl<A: Allocator, M: SharingMode> HeapBase<A, M> {
    pub fn new(parent: A, config: HeapConfig) -> AllocResult<Self> {
        config.validate()?;
        Ok(Self {
            parent,
            config,
            bases: (0..config.number_of_chunks)
                .map(|_| AtomicPtr::new(ptr::null_mut()))
                .collect(),
            state: Lockable::new(HeapState::new(config.number_of_chunks)),
        })
    }

    #[inline]
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    #[inline]
    pub fn parent(&self) -> &A {
        &self.parent
    }

    /// Chunks currently obtained from the parent
    pub fn chunks_in_use(&self) -> usize {
        self.state.with(|s| s.chunks_in_use())
    }

    /// Bytes below the cursors of all chunks
    pub fn used(&self) -> usize {
        self.state.with(|s| s.chunks.iter().map(|c| c.cursor).sum())
    }

    #[inline(always)]
    fn aligned(&self, size: usize) -> Option<usize> {
        (size <= self.config.chunk_size).then(|| round_to_alignment(DEFAULT_ALIGNMENT, size))
    }

    /// Obtain a chunk from the parent for slot `index`
    fn materialize(&self, state: &mut HeapState, index: usize) -> bool {
        let memory = self.parent.allocate(self.config.chunk_size);
        if memory.is_empty() {
            trace!(index, "parent refused a heap chunk");
            return false;
        }
        trace!(index, chunk_size = self.config.chunk_size, "heap chunk materialized");
        self.bases[index].store(memory.as_ptr(), Ordering::Release);
        state.chunks[index] = Chunk {
            memory,
            cursor: 0,
        };
        state.mark(index, true);
        true
    }

    fn release_chunks(&self, state: &mut HeapState) -> usize {
        let mut released = 0;
        for (index, chunk) in state.chunks.iter_mut().enumerate() {
            if chunk.memory.is_empty() {
                continue;
            }
            self.bases[index].store(ptr::null_mut(), Ordering::Release);
            self.parent.deallocate(chunk.memory.take());
            chunk.cursor = 0;
            released += 1;
        }
        state.occupancy.iter_mut().for_each(|w| *w = 0);
        released
    }
}

impl<A: Allocator, M: SharingMode> Drop for HeapBase<A, M> {
    fn drop(&mut self) {
        let mut state = std::mem::replace(self.state.get_mut(), HeapState::new(0));
        self.release_chunks(&mut state);
    }
}

impl<A: Allocator, M: SharingMode> std::fmt::Debug for HeapBase<A, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("shared", &M::SHARED)
            .field("config", &self.config)
            .field("chunks_in_use", &self.chunks_in_use())
            .finish()
    }
}

impl<A: Allocator, M: SharingMode> Allocator for HeapBase<A, M> {
    const ALIGNMENT: usize = if A::ALIGNMENT < DEFAULT_ALIGNMENT {
        A::ALIGNMENT
    } else {
        DEFAULT_ALIGNMENT
    };

    const SUPPORTS_TRUNCATED_DEALLOCATION: bool = true;

    fn allocate(&self, size: usize) -> Block {
        if size == 0 {
            return Block::empty();
        }
        let Some(length) = self.aligned(size) else {
            return Block::empty();
        };
        let chunk_size = self.config.chunk_size;

        self.state.with(|state| {
            let index = state
                .chunks
                .iter()
                .position(|c| !c.memory.is_empty() && chunk_size - c.cursor >= length);
            let index = match index {
                Some(index) => index,
                None => match state.first_vacant() {
                    Some(index) if self.materialize(state, index) => index,
                    _ => return Block::empty(),
                },
            };
            let chunk = &mut state.chunks[index];
            let start = chunk.cursor;
            chunk.cursor += length;
            Block::new(chunk.memory.as_ptr().wrapping_add(start), length)
        })
    }

    fn deallocate(&self, block: Block) {
        if block.is_empty() {
            return;
        }
        let chunk_size = self.config.chunk_size;
        self.state.with(|state| match state.locate(block.as_ptr(), chunk_size) {
            Some((chunk, offset)) => {
                if offset + block.len() == chunk.cursor {
                    chunk.cursor = offset;
                }
            }
            None => warn!(addr = ?block.as_ptr(), len = block.len(), "block not owned by heap"),
        });
    }

    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        if realloc::handled_default(self, block, new_size) {
            return true;
        }
        let Some(length) = self.aligned(new_size) else {
            return false;
        };
        let chunk_size = self.config.chunk_size;
        let in_place = self.state.with(|state| {
            let Some((chunk, offset)) = state.locate(block.as_ptr(), chunk_size) else {
                return false;
            };
            if offset + block.len() == chunk.cursor {
                if offset + length > chunk_size {
                    return false;
                }
                chunk.cursor = offset + length;
                return true;
            }
            length <= block.len()
        });
        if in_place {
            *block = Block::new(block.as_ptr(), length);
            return true;
        }
        realloc::with_copy(self, self, block, new_size)
    }
}

impl<A: Allocator, M: SharingMode> OwnershipTestable for HeapBase<A, M> {
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        if block.is_empty() {
            return false;
        }
        let addr = block.as_ptr() as usize;
        let chunk_size = self.config.chunk_size;
        self.bases.iter().any(|base| {
            let base = base.load(Ordering::Acquire) as usize;
            base != 0 && addr >= base && addr - base < chunk_size
        })
    }
}

impl<A: Allocator, M: SharingMode> Expandable for HeapBase<A, M> {
    fn expand(&self, block: &mut Block, delta: usize) -> bool {
        if delta == 0 {
            return true;
        }
        if block.is_empty() {
            *block = self.allocate(delta);
            return !block.is_empty();
        }
        let Some(grow) = self.aligned(delta) else {
            return false;
        };
        let chunk_size = self.config.chunk_size;
        let grown = self.state.with(|state| {
            let Some((chunk, offset)) = state.locate(block.as_ptr(), chunk_size) else {
                return false;
            };
            if offset + block.len() != chunk.cursor || chunk.cursor + grow > chunk_size {
                return false;
            }
            chunk.cursor += grow;
            true
        });
        if grown {
            *block = Block::new(block.as_ptr(), block.len() + grow);
        }
        grown
    }
}

impl<A: Allocator, M: SharingMode> BulkResettable for HeapBase<A, M> {
    fn deallocate_all(&self) {
        let released = self.state.with(|state| self.release_chunks(state));
        debug!(released, "heap reset");
    }
}
