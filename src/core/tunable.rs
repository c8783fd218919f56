/*!
 * Tunable Sizes
 * One accessor for sizes fixed at construction or assigned later at runtime
 */

use super::errors::{AllocError, AllocResult};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Marker for a dynamic setting that has not been assigned yet
pub const UNSET: usize = usize::MAX;

/// Size parameter that is either fixed up front or assigned once later
///
/// Bucketizers build their buckets first and hand each bucket its bounds
/// afterwards, which is what the dynamic form is for.
///
/// # Example
///
/// ```ignore
/// let fixed = Tunable::fixed(64);
/// let later = Tunable::deferred();
/// later.set(128)?;
/// assert_eq!(fixed.value() + later.value(), 192);
/// ```
#[derive(Debug)]
pub enum Tunable {
    /// Value chosen by the composer at construction
    Static(usize),
    /// Value read from a field, assignable exactly once
    Dynamic(AtomicUsize),
}

impl Tunable {
    /// Fixed value
    #[inline]
    pub const fn fixed(value: usize) -> Self {
        Tunable::Static(value)
    }

    /// Value to be assigned later through [`Tunable::set`]
    #[inline]
    pub const fn deferred() -> Self {
        Tunable::Dynamic(AtomicUsize::new(UNSET))
    }

    /// Current value, [`UNSET`] for a dynamic setting not yet assigned
    #[inline(always)]
    pub fn value(&self) -> usize {
        match self {
            Tunable::Static(v) => *v,
            Tunable::Dynamic(v) => v.load(Ordering::Acquire),
        }
    }

    /// Whether a value is available
    #[inline]
    pub fn is_set(&self) -> bool {
        self.value() != UNSET
    }

    /// Assign a dynamic setting
    ///
    /// Fails for static settings and for dynamic ones that already hold a value.
    pub fn set(&self, value: usize) -> AllocResult<()> {
        match self {
            Tunable::Static(v) => Err(AllocError::SettingFrozen(*v)),
            Tunable::Dynamic(cell) => cell
                .compare_exchange(UNSET, value, Ordering::AcqRel, Ordering::Acquire)
                .map(|_| ())
                .map_err(AllocError::SettingFrozen),
        }
    }
}

impl Clone for Tunable {
    fn clone(&self) -> Self {
        match self {
            Tunable::Static(v) => Tunable::Static(*v),
            Tunable::Dynamic(v) => Tunable::Dynamic(AtomicUsize::new(v.load(Ordering::Acquire))),
        }
    }
}

impl From<usize> for Tunable {
    fn from(value: usize) -> Self {
        Tunable::fixed(value)
    }
}
