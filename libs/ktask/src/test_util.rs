// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::vec::Vec;

use sched_lock::{SchedLock, Spinlock, StdPreemption};

use crate::cancel::{CancelState, CancelType, Cancelability};
use crate::delete::TaskDeleter;
use crate::error::Errno;
use crate::id::TaskId;
use crate::services::{CancelNotifier, ProcessExit, TaskRegistry, Terminator};
use crate::table::TaskTable;
use crate::task::{TaskControl, TaskKind};

/// Panic payload of [`MockKernel::exit_success`].
#[derive(Debug)]
pub(crate) struct ProcessExited;

/// A kernel made of a [`TaskTable`] and recording doubles for the other services.
///
/// The doubles check the scheduler lock discipline: notifications must arrive with the lock held
/// (and the target actually inside a cancellation point), teardown and exit with it released.
pub(crate) struct MockKernel {
    pub(crate) sched: Arc<SchedLock<StdPreemption>>,
    pub(crate) table: TaskTable,
    pub(crate) notified: Spinlock<Vec<TaskId>>,
    pub(crate) terminated: Spinlock<Vec<(TaskId, bool)>>,
    /// If set, the next teardown fails with this error.
    pub(crate) fail_termination: Spinlock<Option<Errno>>,
}

impl MockKernel {
    pub(crate) fn new() -> Self {
        Self {
            sched: Arc::new(SchedLock::new()),
            table: TaskTable::new(),
            notified: Spinlock::new(Vec::new()),
            terminated: Spinlock::new(Vec::new()),
            fail_termination: Spinlock::new(None),
        }
    }

    /// Registers a task with the given cancellation modes.
    pub(crate) fn spawn(
        &self,
        id: u32,
        kind: TaskKind,
        cancelability: Cancelability,
        cancel_type: CancelType,
    ) -> Arc<TaskControl> {
        let task = Arc::new(TaskControl::with_cancel_state(
            &*self.sched,
            TaskId::new(id),
            kind,
            CancelState::new(cancelability, cancel_type),
        ));
        self.table.insert(task.clone()).unwrap();
        task
    }

    /// Registers a task and makes it the running one.
    pub(crate) fn spawn_running(
        &self,
        id: u32,
        cancelability: Cancelability,
        cancel_type: CancelType,
    ) -> Arc<TaskControl> {
        let task = self.spawn(id, TaskKind::Task, cancelability, cancel_type);
        self.table.switch_to(task.id()).unwrap();
        task
    }

    pub(crate) fn deleter(&self) -> TaskDeleter<'_, StdPreemption, Self> {
        TaskDeleter::new(&*self.sched, self)
    }

    /// Puts `task` `depth` levels deep into cancellation points, as if it was blocked there.
    pub(crate) fn block_in_cancellation_points(&self, task: &TaskControl, depth: usize) {
        let guard = self.sched.lock();
        let state = task.cancel_state(&guard);
        for _ in 0..depth {
            state.enter_cancellation_point();
        }
    }

    pub(crate) fn state_of(&self, task: &TaskControl) -> crate::cancel::CancelSnapshot {
        let guard = self.sched.lock();
        task.cancel_state(&guard).snapshot()
    }

    pub(crate) fn notifications(&self) -> usize {
        self.notified.lock().len()
    }

    pub(crate) fn terminations(&self) -> Vec<(TaskId, bool)> {
        self.terminated.lock().clone()
    }
}

impl TaskRegistry for MockKernel {
    type Handle = Arc<TaskControl>;

    fn lookup(&self, id: TaskId) -> Option<Self::Handle> {
        self.table.lookup(id)
    }

    fn current_task(&self) -> Self::Handle {
        self.table.current_task()
    }
}

impl CancelNotifier<Arc<TaskControl>> for MockKernel {
    fn notify(&self, task: &Arc<TaskControl>) {
        assert!(
            self.sched.is_owned_by_current_cpu() && StdPreemption::is_disabled(),
            "notifier called without the scheduler lock held"
        );

        // the lock is re-entrant, so peeking at the state from in here must not deadlock
        let guard = self.sched.lock();
        assert!(
            task.cancel_state(&guard).cp_depth() > 0,
            "notified a task that isn't in a cancellation point"
        );

        self.notified.lock().push(task.id());
    }
}

impl Terminator for MockKernel {
    fn terminate(&self, id: TaskId, graceful: bool) -> Result<(), Errno> {
        assert!(
            !StdPreemption::is_disabled(),
            "teardown must run with the scheduler lock released"
        );

        if let Some(errno) = self.fail_termination.lock().take() {
            return Err(errno);
        }

        self.table.remove(id).ok_or(Errno::ESRCH)?;
        self.terminated.lock().push((id, graceful));
        Ok(())
    }
}

impl ProcessExit for MockKernel {
    fn exit_success(&self) -> ! {
        assert!(
            !StdPreemption::is_disabled(),
            "exit must run with the scheduler lock released"
        );
        panic::panic_any(ProcessExited)
    }
}

/// Runs `f`, returning `Err(())` if it exited the calling task through [`ProcessExit`].
///
/// Any other panic is propagated.
pub(crate) fn catch_exit<R>(f: impl FnOnce() -> R) -> Result<R, ()> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(ret) => Ok(ret),
        Err(payload) if is_exit(&*payload) => Err(()),
        Err(payload) => panic::resume_unwind(payload),
    }
}

fn is_exit(payload: &(dyn Any + Send)) -> bool {
    payload.is::<ProcessExited>()
}
