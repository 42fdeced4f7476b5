// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The target task's half of the cancellation protocol.
//!
//! Deleting a task with deferred cancellation, or while its cancelability is disabled, only marks
//! a request as pending. The functions here are how the task itself later changes those modes
//! and acts on what is pending. Each one takes the scheduler lock for its flag window.

use sched_lock::{Preemption, SchedLock};

use crate::cancel::{CancelType, Cancelability};
use crate::error::Canceled;
use crate::task::TaskControl;

/// Changes whether `task` accepts cancellation requests, returning the previous setting.
///
/// Re-enabling cancelability does **not** act on a request that was recorded while disabled. It
/// stays pending until the task reaches a cancellation point or calls [`test_cancel`].
pub fn set_cancelability<P: Preemption>(
    sched: &SchedLock<P>,
    task: &TaskControl,
    cancelability: Cancelability,
) -> Cancelability {
    let guard = sched.lock();
    let prev = task.cancel_state(&guard).set_cancelability(cancelability);
    tracing::trace!(task = %task.id(), ?prev, ?cancelability, "set cancelability");
    prev
}

/// Changes how `task` reacts to cancellation requests, returning the previous cancel type.
pub fn set_cancel_type<P: Preemption>(
    sched: &SchedLock<P>,
    task: &TaskControl,
    cancel_type: CancelType,
) -> CancelType {
    let guard = sched.lock();
    let prev = task.cancel_state(&guard).set_cancel_type(cancel_type);
    tracing::trace!(task = %task.id(), ?prev, ?cancel_type, "set cancel type");
    prev
}

/// Creates a cancellation point: acts on a pending request if cancelability is enabled.
///
/// # Errors
///
/// Returns [`Canceled`] (and clears the pending request) if the task must exit now.
pub fn test_cancel<P: Preemption>(sched: &SchedLock<P>, task: &TaskControl) -> Result<(), Canceled> {
    let guard = sched.lock();
    if task.cancel_state(&guard).take_pending() {
        tracing::trace!(task = %task.id(), "acting on pending cancellation");
        Err(Canceled(()))
    } else {
        Ok(())
    }
}

/// The task is suspended inside a cancellation point for as long as this guard lives.
///
/// Blocking calls that are cancellation points enter one before they block. A deletion request
/// arriving meanwhile wakes the call through the
/// [`CancelNotifier`](crate::CancelNotifier), after which the call uses
/// [`CancellationPoint::check`] to find out it has been canceled.
#[cfg(feature = "cancellation-points")]
#[must_use = "the cancellation point is left as soon as the guard is dropped"]
pub struct CancellationPoint<'a, P: Preemption> {
    sched: &'a SchedLock<P>,
    task: &'a TaskControl,
}

#[cfg(feature = "cancellation-points")]
impl<'a, P: Preemption> CancellationPoint<'a, P> {
    /// Enters a cancellation point on behalf of `task`, which must be the calling task.
    ///
    /// # Errors
    ///
    /// Returns [`Canceled`] instead of entering if an enabled request is already pending. The
    /// pending request is consumed.
    pub fn enter(sched: &'a SchedLock<P>, task: &'a TaskControl) -> Result<Self, Canceled> {
        let guard = sched.lock();
        let state = task.cancel_state(&guard);
        if state.take_pending() {
            tracing::trace!(task = %task.id(), "canceled on entry to cancellation point");
            return Err(Canceled(()));
        }
        state.enter_cancellation_point();
        drop(guard);

        Ok(Self { sched, task })
    }

    /// Checks whether the task has been canceled while inside this cancellation point.
    ///
    /// # Errors
    ///
    /// Returns [`Canceled`] (and clears the pending request) if the task must exit.
    pub fn check(&self) -> Result<(), Canceled> {
        test_cancel(self.sched, self.task)
    }
}

#[cfg(feature = "cancellation-points")]
impl<P: Preemption> Drop for CancellationPoint<'_, P> {
    fn drop(&mut self) {
        let guard = self.sched.lock();
        self.task.cancel_state(&guard).leave_cancellation_point();
    }
}
