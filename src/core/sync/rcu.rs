/*!
 * Read-Copy-Update (RCU) Cell
 * Lock-free snapshots for lists that are read on every call and grow rarely
 */

use arc_swap::ArcSwap;
use std::sync::Arc;

/// RCU-protected value with zero-contention reads
///
/// # Performance
///
/// - **Reads**: a single atomic pointer load plus a refcount bump
/// - **Writes**: clone-modify-swap; writers should serialize among themselves
///   when the update must not be retried
///
/// # Example
///
/// ```ignore
/// let instances = RcuCell::new(vec![Arc::new(first)]);
///
/// // Readers walk a consistent snapshot
/// for instance in instances.load().iter().rev() { /* ... */ }
///
/// // Writers publish a grown copy
/// instances.update(|list| {
///     let mut grown = list.clone();
///     grown.push(Arc::new(next));
///     grown
/// });
/// ```
pub struct RcuCell<T> {
    inner: ArcSwap<T>,
}

impl<T> RcuCell<T> {
    #[inline]
    pub fn new(value: T) -> Self {
        Self {
            inner: ArcSwap::from_pointee(value),
        }
    }

    /// Current snapshot
    #[inline(always)]
    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    /// Clone-modify-swap
    ///
    /// The closure may run more than once under contention.
    #[inline]
    pub fn update<F>(&self, mut f: F)
    where
        F: FnMut(&T) -> T,
    {
        self.inner.rcu(|old: &Arc<T>| f(&**old));
    }

    /// Replace the value, returning the previous snapshot
    #[inline]
    pub fn swap(&self, value: T) -> Arc<T> {
        self.inner.swap(Arc::new(value))
    }
}
