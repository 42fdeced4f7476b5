// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use sched_lock::{Preemption, SchedCell, SchedLock, SchedLockGuard};

use crate::cancel::CancelState;
use crate::id::TaskId;

/// What kind of schedulable entity a control record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Task,
    KernelThread,
    /// A thread sharing its parent's resources (a pthread). These are canceled through their own
    /// interface and can't be deleted as tasks.
    LightweightThread,
}

/// The subset of [`TaskKind`]s that may be deleted as tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletableKind {
    Task,
    KernelThread,
}

/// Returned when converting [`TaskKind::LightweightThread`] into a [`DeletableKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedKind(pub TaskKind);

impl fmt::Display for UnsupportedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} can't be deleted as a task", self.0)
    }
}

impl core::error::Error for UnsupportedKind {}

impl TryFrom<TaskKind> for DeletableKind {
    type Error = UnsupportedKind;

    fn try_from(kind: TaskKind) -> Result<Self, Self::Error> {
        match kind {
            TaskKind::Task => Ok(DeletableKind::Task),
            TaskKind::KernelThread => Ok(DeletableKind::KernelThread),
            TaskKind::LightweightThread => Err(UnsupportedKind(kind)),
        }
    }
}

impl From<DeletableKind> for TaskKind {
    fn from(kind: DeletableKind) -> Self {
        match kind {
            DeletableKind::Task => TaskKind::Task,
            DeletableKind::KernelThread => TaskKind::KernelThread,
        }
    }
}

/// The part of a task's control record this crate cares about.
///
/// Registries hand out handles to control records (`Arc<TaskControl>`, `&'static TaskControl`,
/// ...), see [`TaskRegistry`](crate::TaskRegistry).
pub struct TaskControl {
    id: TaskId,
    kind: TaskKind,
    cancel: SchedCell<CancelState>,
}

static_assertions::assert_impl_all!(TaskControl: Send, Sync);

impl TaskControl {
    /// Creates a control record whose cancellation state is guarded by `sched`.
    ///
    /// `sched` must be the lock all other accesses to this task's state go through, the state
    /// is only ever accessible with one of its guards.
    pub fn new<P: Preemption>(sched: &SchedLock<P>, id: TaskId, kind: TaskKind) -> Self {
        Self::with_cancel_state(sched, id, kind, CancelState::default())
    }

    pub fn with_cancel_state<P: Preemption>(
        sched: &SchedLock<P>,
        id: TaskId,
        kind: TaskKind,
        cancel: CancelState,
    ) -> Self {
        Self {
            id,
            kind,
            cancel: SchedCell::new(sched, cancel),
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Borrows the cancellation state for as long as `guard` is held.
    ///
    /// # Panics
    ///
    /// Panics if `guard` doesn't belong to the lock this task was created with.
    #[inline]
    #[track_caller]
    pub fn cancel_state<'g, P: Preemption>(
        &'g self,
        guard: &'g SchedLockGuard<'_, P>,
    ) -> &'g CancelState {
        self.cancel.get(guard)
    }
}

impl fmt::Debug for TaskControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskControl")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
