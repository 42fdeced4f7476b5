// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use sched_lock::{Preemption, SchedLock};

use crate::cancel::Cancelability;
#[cfg(feature = "cancellation-points")]
use crate::cancel::CancelType;
use crate::error::Error;
use crate::id::TaskId;
use crate::services::{CancelNotifier, ProcessExit, TaskRegistry, Terminator};
use crate::task::DeletableKind;

#[cfg(test)]
mod race;

/// What a deletion request turned into, decided under the scheduler lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    /// The request was recorded as pending. The task keeps running.
    Pending,
    /// The request was recorded as pending and the task, blocked in a cancellation point, was
    /// notified.
    PendingNotified,
    /// The task accepts asynchronous cancellation and must be torn down now.
    Terminate,
}

/// Deletes tasks, obeying their cancellation state.
///
/// `K` is the kernel: the task registry, the cancellation notifier, the termination service and
/// process exit, see [`crate::services`].
pub struct TaskDeleter<'k, P: Preemption, K: ?Sized> {
    sched: &'k SchedLock<P>,
    kernel: &'k K,
}

impl<'k, P, K> TaskDeleter<'k, P, K>
where
    P: Preemption,
    K: TaskRegistry
        + CancelNotifier<<K as TaskRegistry>::Handle>
        + Terminator
        + ProcessExit
        + ?Sized,
{
    pub const fn new(sched: &'k SchedLock<P>, kernel: &'k K) -> Self {
        Self { sched, kernel }
    }

    /// Causes the task `target` to cease to exist. [`TaskId::CALLER`] refers to the calling task.
    ///
    /// What happens depends on the target's cancellation state:
    ///
    /// - Cancelability disabled: the request is held pending until the target re-enables it.
    /// - Deferred cancellation: the request is held pending until the target reaches a
    ///   cancellation point. If it is blocked in one right now it is woken up.
    /// - Asynchronous cancellation: the target is torn down before this returns. If the target is
    ///   the calling task, this exits successfully and **never returns**.
    ///
    /// Note that `Ok(())` therefore doesn't mean the target is gone, except in the asynchronous
    /// case. This applies to the calling task too: deleting yourself while in deferred mode only
    /// marks the request pending.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if `target` doesn't resolve to a live task. Nothing is changed.
    /// - [`Error::TerminationFailed`] with the termination service's reason if teardown failed.
    ///
    /// # Panics
    ///
    /// With debug assertions enabled, panics if `target` is a lightweight thread. Those must be
    /// canceled through their own interface.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn delete(&self, target: TaskId) -> Result<(), Error> {
        let caller = self.kernel.current_task().id();
        let target = if target.is_caller() { caller } else { target };

        let task = self.kernel.lookup(target).ok_or(Error::NotFound)?;

        debug_assert!(
            DeletableKind::try_from(task.kind()).is_ok(),
            "task {target} is a {:?}, only tasks and kernel threads can be deleted",
            task.kind()
        );

        let decision = self.decide(&task);
        tracing::trace!(%target, %caller, ?decision);
        match decision {
            Decision::Pending | Decision::PendingNotified => return Ok(()),
            Decision::Terminate => {}
        }

        // don't keep the control record alive across its own teardown
        drop(task);

        if target == caller {
            tracing::trace!("deleting the calling task, exiting");
            self.kernel.exit_success();
        }

        self.kernel
            .terminate(target, false)
            .map_err(Error::TerminationFailed)
    }

    /// Inspects and updates the target's cancellation state with the scheduler lock held, so
    /// neither the target nor an interrupt can change it halfway through.
    fn decide(&self, task: &<K as TaskRegistry>::Handle) -> Decision {
        let guard = self.sched.lock();
        let state = task.cancel_state(&guard);

        if state.cancelability() == Cancelability::Disabled {
            state.mark_pending();
            return Decision::Pending;
        }

        #[cfg(feature = "cancellation-points")]
        if state.cancel_type() == CancelType::Deferred {
            state.mark_pending();

            // The depth check and the notification must be atomic with respect to the target
            // leaving its cancellation point, hence the notify under the lock.
            if state.cp_depth() > 0 {
                self.kernel.notify(task);
                return Decision::PendingNotified;
            }
            return Decision::Pending;
        }

        Decision::Terminate
    }
}
