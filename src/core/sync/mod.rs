/*!
 * Sharing Modes
 *
 * Every pooling, chunked and chaining policy comes in two families:
 * - **Local**: single-threaded or externally synchronized; the "lock" is a
 *   `RefCell` and the pool is a plain bounded stack. Such policies are `!Sync`.
 * - **Shared**: safe for concurrent use; the lock is a `parking_lot::Mutex`
 *   and the pool is a lock-free index stack.
 *
 * Policies are generic over a [`SharingMode`] and pick their lock and pool
 * types through it, so both families share one implementation.
 */

mod index_stack;
mod lock;
mod rcu;

pub use index_stack::{AtomicIndexStack, LocalStack, PoolStack};
pub use lock::Lockable;
pub use rcu::RcuCell;

use parking_lot::Mutex;
use std::cell::RefCell;

/// Selects the synchronization primitives a policy is built from
pub trait SharingMode: 'static {
    /// Mutual exclusion around mutable policy state
    type Lock<T>: Lockable<T>;

    /// Bounded stack used by free list pools
    type Pool: PoolStack;

    /// Whether this mode is safe for concurrent use
    const SHARED: bool;
}

/// Single-threaded family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Local {}

/// Thread-safe family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shared {}

impl SharingMode for Local {
    type Lock<T> = RefCell<T>;
    type Pool = LocalStack;
    const SHARED: bool = false;
}

impl SharingMode for Shared {
    type Lock<T> = Mutex<T>;
    type Pool = AtomicIndexStack;
    const SHARED: bool = true;
}
