/*!
 * Pool Stacks
 *
 * Bounded LIFO stacks of free block addresses used by free lists.
 *
 * ## Lock-free variant
 *
 * [`AtomicIndexStack`] keeps addresses in a fixed slot array and links slots
 * by index instead of threading pointers through freed memory. Two Treiber
 * stacks share the `next` array: one over occupied slots, one over free
 * slots. Each head word packs a 32-bit ABA tag above the 32-bit slot index
 * (stored as index + 1, zero meaning empty), so a slot recycled between a
 * reader's load and its CAS can never be mistaken for the original.
 *
 * Push and pop are CAS retry loops: no blocking, and the uncontended path
 * completes in a single CAS.
 */

use std::cell::RefCell;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, Ordering};

/// Bounded stack of block addresses
pub trait PoolStack {
    /// Stack able to hold `capacity` entries
    fn with_capacity(capacity: usize) -> Self;

    /// Push, handing the address back if the stack is full
    fn push(&self, ptr: NonNull<u8>) -> Result<(), NonNull<u8>>;

    /// Pop the most recently pushed address (ordering is best-effort when shared)
    fn pop(&self) -> Option<NonNull<u8>>;

    fn capacity(&self) -> usize;

    /// Entries currently held (a snapshot when shared)
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-threaded bounded stack
pub struct LocalStack {
    entries: RefCell<Vec<NonNull<u8>>>,
    capacity: usize,
}

// Safety: the stack exclusively owns the pooled addresses; moving it to
// another thread moves that ownership along. It stays !Sync through RefCell.
unsafe impl Send for LocalStack {}

impl PoolStack for LocalStack {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RefCell::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    #[inline]
    fn push(&self, ptr: NonNull<u8>) -> Result<(), NonNull<u8>> {
        let mut entries = self.entries.borrow_mut();
        if entries.len() >= self.capacity {
            return Err(ptr);
        }
        entries.push(ptr);
        Ok(())
    }

    #[inline]
    fn pop(&self) -> Option<NonNull<u8>> {
        self.entries.borrow_mut().pop()
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

const INDEX_MASK: u64 = 0xFFFF_FFFF;

#[inline(always)]
fn tag_of(word: u64) -> u64 {
    word >> 32
}

#[inline(always)]
fn link_of(word: u64) -> u32 {
    (word & INDEX_MASK) as u32
}

#[inline(always)]
fn pack(tag: u64, link: u32) -> u64 {
    (tag.wrapping_add(1) << 32) | link as u64
}

/// Fixed-capacity lock-free stack of block addresses
pub struct AtomicIndexStack {
    values: Box<[AtomicPtr<u8>]>,
    /// Link to the next slot (index + 1, zero terminates)
    next: Box<[AtomicU32]>,
    head: AtomicU64,
    free: AtomicU64,
    len: AtomicU32,
}

impl AtomicIndexStack {
    /// Detach the top slot of the list rooted at `root`
    #[inline]
    fn pop_slot(&self, root: &AtomicU64) -> Option<usize> {
        let mut current = root.load(Ordering::Acquire);
        loop {
            let link = link_of(current);
            if link == 0 {
                return None;
            }
            let slot = (link - 1) as usize;
            let next = self.next[slot].load(Ordering::Relaxed);
            match root.compare_exchange_weak(
                current,
                pack(tag_of(current), next),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(slot),
                Err(actual) => current = actual,
            }
        }
    }

    /// Attach `slot` on top of the list rooted at `root`
    #[inline]
    fn push_slot(&self, root: &AtomicU64, slot: usize) {
        let mut current = root.load(Ordering::Relaxed);
        loop {
            self.next[slot].store(link_of(current), Ordering::Relaxed);
            match root.compare_exchange_weak(
                current,
                pack(tag_of(current), slot as u32 + 1),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl PoolStack for AtomicIndexStack {
    fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity <= crate::core::limits::MAX_SHARED_POOL_SIZE,
            "Shared pool capacity exceeds 32-bit slot addressing"
        );

        let values = (0..capacity)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        // Chain every slot into the free list: slot i links to slot i + 1
        let next = (0..capacity)
            .map(|i| {
                let link = if i + 1 < capacity { i as u32 + 2 } else { 0 };
                AtomicU32::new(link)
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let free_root = if capacity > 0 { 1 } else { 0 };

        Self {
            values,
            next,
            head: AtomicU64::new(0),
            free: AtomicU64::new(free_root),
            len: AtomicU32::new(0),
        }
    }

    #[inline]
    fn push(&self, ptr: NonNull<u8>) -> Result<(), NonNull<u8>> {
        let Some(slot) = self.pop_slot(&self.free) else {
            return Err(ptr);
        };
        self.values[slot].store(ptr.as_ptr(), Ordering::Relaxed);
        self.push_slot(&self.head, slot);
        self.len.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    #[inline]
    fn pop(&self) -> Option<NonNull<u8>> {
        let slot = self.pop_slot(&self.head)?;
        let value = self.values[slot].swap(ptr::null_mut(), Ordering::Relaxed);
        self.push_slot(&self.free, slot);
        self.len.fetch_sub(1, Ordering::Relaxed);
        NonNull::new(value)
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.values.len()
    }

    #[inline]
    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed) as usize
    }
}
