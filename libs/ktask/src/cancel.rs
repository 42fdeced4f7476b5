// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::cell::Cell;
use core::fmt;

bitflags::bitflags! {
    /// Cancellation related bits of a task's flag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CancelFlags: u8 {
        /// Cancellation requests are held pending until the task re-enables cancelability.
        const NONCANCELABLE = 1 << 0;
        /// Requests are acted upon at the next cancellation point instead of immediately.
        const CANCEL_DEFERRED = 1 << 1;
        /// A request has been recorded but not yet acted upon.
        const CANCEL_PENDING = 1 << 2;
    }
}

/// Whether a task currently accepts cancellation requests at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancelability {
    Enabled,
    /// Requests are recorded as pending but never acted upon.
    Disabled,
}

/// How a task with [`Cancelability::Enabled`] reacts to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelType {
    /// Wait for the task to reach a cancellation point.
    Deferred,
    /// Terminate the task right away, wherever it is executing.
    Asynchronous,
}

impl CancelType {
    /// The cancel type new tasks start out with.
    #[cfg(feature = "cancellation-points")]
    pub const DEFAULT: CancelType = CancelType::Deferred;
    /// The cancel type new tasks start out with.
    #[cfg(not(feature = "cancellation-points"))]
    pub const DEFAULT: CancelType = CancelType::Asynchronous;
}

/// The cancellation sub-record of a task's control block.
///
/// Lives inside a [`SchedCell`](sched_lock::SchedCell) and must only be touched with the
/// scheduler lock held. The cancellation point depth is owned by the task itself: other tasks
/// only ever read it.
pub struct CancelState {
    flags: Cell<CancelFlags>,
    cp_depth: Cell<usize>,
}

/// A copy of a [`CancelState`] taken at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelSnapshot {
    pub cancelability: Cancelability,
    pub cancel_type: CancelType,
    pub pending: bool,
    pub cp_depth: usize,
}

impl CancelState {
    #[must_use]
    pub const fn new(cancelability: Cancelability, cancel_type: CancelType) -> Self {
        let mut flags = CancelFlags::empty();
        if let Cancelability::Disabled = cancelability {
            flags = flags.union(CancelFlags::NONCANCELABLE);
        }
        if let CancelType::Deferred = cancel_type {
            flags = flags.union(CancelFlags::CANCEL_DEFERRED);
        }

        Self {
            flags: Cell::new(flags),
            cp_depth: Cell::new(0),
        }
    }

    pub fn flags(&self) -> CancelFlags {
        self.flags.get()
    }

    pub fn cancelability(&self) -> Cancelability {
        if self.flags().contains(CancelFlags::NONCANCELABLE) {
            Cancelability::Disabled
        } else {
            Cancelability::Enabled
        }
    }

    pub fn cancel_type(&self) -> CancelType {
        if self.flags().contains(CancelFlags::CANCEL_DEFERRED) {
            CancelType::Deferred
        } else {
            CancelType::Asynchronous
        }
    }

    pub fn is_pending(&self) -> bool {
        self.flags().contains(CancelFlags::CANCEL_PENDING)
    }

    /// How many cancellation points the task is currently suspended in.
    pub fn cp_depth(&self) -> usize {
        self.cp_depth.get()
    }

    pub fn snapshot(&self) -> CancelSnapshot {
        CancelSnapshot {
            cancelability: self.cancelability(),
            cancel_type: self.cancel_type(),
            pending: self.is_pending(),
            cp_depth: self.cp_depth(),
        }
    }

    pub(crate) fn set_cancelability(&self, cancelability: Cancelability) -> Cancelability {
        let prev = self.cancelability();
        self.update(|flags| {
            flags.set(
                CancelFlags::NONCANCELABLE,
                cancelability == Cancelability::Disabled,
            );
        });
        prev
    }

    pub(crate) fn set_cancel_type(&self, cancel_type: CancelType) -> CancelType {
        let prev = self.cancel_type();
        self.update(|flags| {
            flags.set(
                CancelFlags::CANCEL_DEFERRED,
                cancel_type == CancelType::Deferred,
            );
        });
        prev
    }

    /// Records a cancellation request. Setting an already pending request is a no-op.
    pub(crate) fn mark_pending(&self) {
        self.update(|flags| flags.insert(CancelFlags::CANCEL_PENDING));
    }

    /// Consumes the pending request if cancelability is enabled, returning whether there was one
    /// to act upon.
    pub(crate) fn take_pending(&self) -> bool {
        if self.cancelability() == Cancelability::Disabled || !self.is_pending() {
            return false;
        }
        self.update(|flags| flags.remove(CancelFlags::CANCEL_PENDING));
        true
    }

    pub(crate) fn enter_cancellation_point(&self) {
        let depth = self
            .cp_depth
            .get()
            .checked_add(1)
            .expect("cancellation point depth overflow");
        self.cp_depth.set(depth);
    }

    pub(crate) fn leave_cancellation_point(&self) {
        let depth = self
            .cp_depth
            .get()
            .checked_sub(1)
            .expect("left a cancellation point that was never entered");
        self.cp_depth.set(depth);
    }

    fn update(&self, f: impl FnOnce(&mut CancelFlags)) {
        let mut flags = self.flags.get();
        f(&mut flags);
        self.flags.set(flags);
    }
}

impl Default for CancelState {
    fn default() -> Self {
        Self::new(Cancelability::Enabled, CancelType::DEFAULT)
    }
}

impl fmt::Debug for CancelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let CancelSnapshot {
            cancelability,
            cancel_type,
            pending,
            cp_depth,
        } = self.snapshot();

        f.debug_struct("CancelState")
            .field("cancelability", &cancelability)
            .field("cancel_type", &cancel_type)
            .field("pending", &pending)
            .field("cp_depth", &cp_depth)
            .finish()
    }
}
