/*!
 * Cascading Allocators
 *
 * Unbounded capacity from bounded policies: when the newest instance cannot
 * serve a request, a fresh one is created and appended.
 *
 * ## Concurrency
 *
 * The instance list is an RCU snapshot. `owns`, `deallocate` and the fast
 * path of `allocate` read it without locking. Growth is serialized by the
 * sharing mode's lock; under the lock the list is re-read so that threads
 * racing on an exhausted instance add one successor, not one each.
 */

use crate::core::sync::{Lockable, RcuCell};
use crate::core::{
    realloc, Allocator, Block, BulkResettable, Expandable, Local, OwnershipTestable, Shared,
    SharingMode,
};
use std::sync::Arc;
use tracing::{debug, warn};

type Factory<A> = Box<dyn Fn() -> A + Send + Sync>;

/// Chain of instances of one policy, newest last
///
/// Use the [`CascadingAllocators`] and [`SharedCascadingAllocators`] aliases.
///
/// # Performance
///
/// - **Allocate**: O(1) while the newest instance has room
/// - **Deallocate/Owns**: O(n) walk over instances, newest first
///
/// # Example
///
/// ```ignore
/// let arenas = CascadingAllocators::new(|| {
///     Heap::new(SystemAllocator, HeapConfig::single_chunk(4096)).unwrap()
/// });
/// let a = arenas.allocate(4096);
/// let b = arenas.allocate(4096);  // second heap created
/// assert_eq!(arenas.instance_count(), 2);
/// ```
pub struct CascadingAllocatorsBase<A, M: SharingMode> {
    factory: Factory<A>,
    instances: RcuCell<Vec<Arc<A>>>,
    grow: M::Lock<()>,
}

/// Single-threaded cascade
pub type CascadingAllocators<A> = CascadingAllocatorsBase<A, Local>;

/// Cascade safe for concurrent use
pub type SharedCascadingAllocators<A> = CascadingAllocatorsBase<A, Shared>;

impl<A: OwnershipTestable, M: SharingMode> CascadingAllocatorsBase<A, M> {
    /// Cascade creating instances with `factory`, starting with one
    pub fn new(factory: impl Fn() -> A + Send + Sync + 'static) -> Self {
        let first = Arc::new(factory());
        Self {
            factory: Box::new(factory),
            instances: RcuCell::new(vec![first]),
            grow: Lockable::new(()),
        }
    }

    /// Number of live instances
    #[inline]
    pub fn instance_count(&self) -> usize {
        self.instances.load().len()
    }

    /// Snapshot of the instances, oldest first
    #[inline]
    pub fn instances(&self) -> Arc<Vec<Arc<A>>> {
        self.instances.load()
    }

    /// Newest-first search for the instance that produced `block`
    #[inline]
    fn owner_of(&self, block: &Block) -> Option<Arc<A>> {
        if block.is_empty() {
            return None;
        }
        self.instances
            .load()
            .iter()
            .rev()
            .find(|instance| instance.owns(block))
            .cloned()
    }

    /// Slow path: the newest instance was exhausted
    fn grow_and_allocate(&self, size: usize, seen: &Arc<Vec<Arc<A>>>) -> Block {
        self.grow.with(|_| {
            let current = self.instances.load();
            if !Arc::ptr_eq(&current, seen) {
                // Someone grew (or reset) the list while we waited
                if let Some(newest) = current.last() {
                    let block = newest.allocate(size);
                    if !block.is_empty() {
                        return block;
                    }
                }
            }

            let fresh = Arc::new((self.factory)());
            let block = fresh.allocate(size);
            if block.is_empty() {
                debug!(size, "fresh instance cannot serve request, discarded");
                return Block::empty();
            }
            self.instances.update(|list| {
                let mut grown = list.clone();
                grown.push(Arc::clone(&fresh));
                grown
            });
            debug!(
                instances = current.len() + 1,
                size, "cascading allocator grew"
            );
            block
        })
    }
}

impl<A: OwnershipTestable + Default + 'static, M: SharingMode> Default
    for CascadingAllocatorsBase<A, M>
{
    fn default() -> Self {
        Self::new(A::default)
    }
}

impl<A, M: SharingMode> std::fmt::Debug for CascadingAllocatorsBase<A, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CascadingAllocators")
            .field("shared", &M::SHARED)
            .field("instances", &self.instances.load().len())
            .finish()
    }
}

impl<A: OwnershipTestable, M: SharingMode> Allocator for CascadingAllocatorsBase<A, M> {
    const ALIGNMENT: usize = A::ALIGNMENT;
    const SUPPORTS_TRUNCATED_DEALLOCATION: bool = A::SUPPORTS_TRUNCATED_DEALLOCATION;

    fn allocate(&self, size: usize) -> Block {
        if size == 0 {
            return Block::empty();
        }
        let snapshot = self.instances.load();
        if let Some(newest) = snapshot.last() {
            let block = newest.allocate(size);
            if !block.is_empty() {
                return block;
            }
        }
        self.grow_and_allocate(size, &snapshot)
    }

    fn deallocate(&self, block: Block) {
        if block.is_empty() {
            return;
        }
        match self.owner_of(&block) {
            Some(owner) => owner.deallocate(block),
            None => warn!(
                addr = ?block.as_ptr(),
                len = block.len(),
                "block not owned by any cascaded instance"
            ),
        }
    }

    fn reallocate(&self, block: &mut Block, new_size: usize) -> bool {
        if realloc::handled_default(self, block, new_size) {
            return true;
        }
        let Some(owner) = self.owner_of(block) else {
            return false;
        };
        if owner.reallocate(block, new_size) {
            return true;
        }
        realloc::with_copy(&*owner, self, block, new_size)
    }
}

impl<A: OwnershipTestable, M: SharingMode> OwnershipTestable for CascadingAllocatorsBase<A, M> {
    #[inline]
    fn owns(&self, block: &Block) -> bool {
        self.owner_of(block).is_some()
    }
}

impl<A: OwnershipTestable + Expandable, M: SharingMode> Expandable
    for CascadingAllocatorsBase<A, M>
{
    fn expand(&self, block: &mut Block, delta: usize) -> bool {
        if delta == 0 {
            return true;
        }
        if block.is_empty() {
            *block = self.allocate(delta);
            return !block.is_empty();
        }
        self.owner_of(block)
            .is_some_and(|owner| owner.expand(block, delta))
    }
}

impl<A: OwnershipTestable, M: SharingMode> BulkResettable for CascadingAllocatorsBase<A, M> {
    /// Drop every instance and start over with a single fresh one
    fn deallocate_all(&self) {
        let released = self.grow.with(|_| {
            let fresh = Arc::new((self.factory)());
            self.instances.swap(vec![fresh]).len()
        });
        debug!(released, "cascading allocator reset");
    }
}
