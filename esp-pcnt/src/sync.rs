//! Interrupt-safe locking.
//!
//! Everything shared between the dispatcher and normal-priority code is
//! guarded by the global critical section of the `critical-section` crate. On
//! the chip it masks interrupts on the current core, so it is safe to enter
//! from an interrupt handler and must only be held for short, bounded
//! sections.

use core::marker::PhantomData;

use critical_section::{CriticalSection, RestoreState};

/// A scoped critical section.
///
/// The critical section is entered by [`CriticalGuard::acquire`] and left
/// when the guard is dropped, on every exit path. Guards nest; they must be
/// dropped in the reverse order they were acquired, which scoping ensures
/// unless a guard is leaked.
#[must_use]
pub struct CriticalGuard {
    restore: RestoreState,
    // The restore state belongs to the current core.
    _not_send: PhantomData<*mut ()>,
}

impl CriticalGuard {
    /// Enters the critical section.
    pub fn acquire() -> Self {
        // SAFETY: released in `Drop`, which runs in reverse acquisition order
        // for scoped guards.
        let restore = unsafe { critical_section::acquire() };
        Self {
            restore,
            _not_send: PhantomData,
        }
    }

    /// A token proving the critical section is held, for use with
    /// [`critical_section::Mutex`].
    pub fn token(&self) -> CriticalSection<'_> {
        // SAFETY: the critical section is held for as long as `self` lives.
        unsafe { CriticalSection::new() }
    }
}

impl Drop for CriticalGuard {
    fn drop(&mut self) {
        // SAFETY: `restore` was returned by the matching `acquire`.
        unsafe { critical_section::release(self.restore) };
    }
}

/// Data guarded by the critical section.
///
/// Access is not reentrant: calling [`Locked::with`] from inside the closure
/// of another `with` on the same instance panics.
#[cfg(any(test, feature = "sim"))]
pub(crate) struct Locked<T> {
    data: critical_section::Mutex<core::cell::RefCell<T>>,
}

#[cfg(any(test, feature = "sim"))]
impl<T> Locked<T> {
    pub(crate) const fn new(data: T) -> Self {
        Self {
            data: critical_section::Mutex::new(core::cell::RefCell::new(data)),
        }
    }

    /// Provide exclusive access to the protected data to the given closure.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.data.borrow_ref_mut(cs)))
    }
}
