// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use crate::{Preemption, SchedLock, SchedLockGuard};

/// Data that may only be accessed while holding a particular [`SchedLock`].
///
/// The cell remembers which lock it belongs to and hands out shared references only in exchange
/// for a guard of that lock, so unguarded access doesn't type-check. Locks are told apart by an
/// identity that moves with them, so a lock may be moved (into an `Arc`, say) after cells were
/// created against it. Because the lock is re-entrant there can be several guards on the same
/// CPU at once, the cell therefore never hands out `&mut T`. Use `Cell`s inside `T` for the fields that change.
pub struct SchedCell<T: ?Sized> {
    /// [`SchedLock::id`] of the owning lock.
    lock: usize,
    value: T,
}

// Safety: shared access to `value` requires borrowing a guard of the owning `SchedLock`. Guards
// are neither `Send` nor `Sync`, so every borrow of `value` happens on the one CPU holding the
// lock.
unsafe impl<T: ?Sized + Send> Sync for SchedCell<T> {}

impl<T> SchedCell<T> {
    /// Creates a cell guarded by `lock`.
    pub fn new<P: Preemption>(lock: &SchedLock<P>, value: T) -> Self {
        Self {
            lock: lock.id(),
            value,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: ?Sized> SchedCell<T> {
    /// Borrows the contents for as long as `guard` is held.
    ///
    /// # Panics
    ///
    /// Panics if `guard` belongs to a different lock than the one this cell was created with.
    #[inline]
    #[track_caller]
    pub fn get<'g, P: Preemption>(&'g self, guard: &'g SchedLockGuard<'_, P>) -> &'g T {
        assert_eq!(
            SchedLockGuard::sched_lock(guard).id(),
            self.lock,
            "SchedCell accessed under a foreign SchedLock"
        );
        &self.value
    }

    /// Returns a mutable reference to the contents.
    ///
    /// The exclusive borrow statically guarantees no other CPU can access the cell.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: ?Sized> fmt::Debug for SchedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedCell").finish_non_exhaustive()
    }
}
