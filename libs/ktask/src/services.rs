// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The parts of the kernel task deletion relies on but doesn't implement.

use core::ops::Deref;

use crate::error::Errno;
use crate::id::TaskId;
use crate::task::TaskControl;

/// Maps task identifiers to control records.
pub trait TaskRegistry {
    /// A handle keeping a control record alive.
    type Handle: Deref<Target = TaskControl>;

    /// Returns the task registered under `id`, `None` if it is unknown or already gone.
    ///
    /// Must not have side effects.
    fn lookup(&self, id: TaskId) -> Option<Self::Handle>;

    /// Returns the task currently running on the calling CPU (the head of the ready-to-run
    /// ordering). Never fails: there is always a running task.
    fn current_task(&self) -> Self::Handle;
}

/// Wakes a task that is blocked inside a cancellation point so that its blocking call returns
/// with a cancellation outcome.
pub trait CancelNotifier<H> {
    /// Delivers the wake-up.
    ///
    /// Called with the scheduler lock **held**, so it must not block. Implementations only queue
    /// the wake-up. The same blocked call may be notified more than once (every deletion request
    /// that finds the task in a cancellation point notifies), which must be harmless.
    fn notify(&self, task: &H);
}

/// Irreversibly tears down a task.
pub trait Terminator {
    /// Releases the task's stack and control record and removes it from the registry and the
    /// ready-to-run ordering.
    ///
    /// `graceful` is `false` for asynchronous cancellation. Must be safe to call for a task that
    /// a concurrent caller is already tearing down.
    ///
    /// # Errors
    ///
    /// Returns the reason teardown failed. The task is left as it was.
    fn terminate(&self, id: TaskId, graceful: bool) -> Result<(), Errno>;
}

/// Ends the calling task.
pub trait ProcessExit {
    /// Terminates the calling task immediately and successfully (`exit(EXIT_SUCCESS)`).
    fn exit_success(&self) -> !;
}
