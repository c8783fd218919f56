/*!
 * Lock Abstraction
 * Closure-scoped access to state behind a RefCell or a Mutex
 */

use parking_lot::Mutex;
use std::cell::RefCell;

/// Exclusive access to a value for the duration of a closure
///
/// The closure must not re-enter the same lock. Policies only call into
/// their parents while holding it, never into themselves.
pub trait Lockable<T> {
    fn new(value: T) -> Self;

    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R;

    /// Access without locking when the caller holds `&mut`
    fn get_mut(&mut self) -> &mut T;
}

impl<T> Lockable<T> for RefCell<T> {
    #[inline]
    fn new(value: T) -> Self {
        RefCell::new(value)
    }

    #[inline(always)]
    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.borrow_mut())
    }

    #[inline]
    fn get_mut(&mut self) -> &mut T {
        RefCell::get_mut(self)
    }
}

impl<T> Lockable<T> for Mutex<T> {
    #[inline]
    fn new(value: T) -> Self {
        Mutex::new(value)
    }

    #[inline(always)]
    fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock())
    }

    #[inline]
    fn get_mut(&mut self) -> &mut T {
        Mutex::get_mut(self)
    }
}
