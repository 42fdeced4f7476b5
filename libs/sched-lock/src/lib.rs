// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The scheduler lock and the primitives built around it.
//!
//! [`SchedLock`] is a re-entrant, counting lock that suppresses preemption on the owning CPU for
//! as long as it is held. It is the one lock that makes reads and writes of per-task scheduler
//! state (cancellation flags, cancellation point depth, ...) atomic with respect to interrupts
//! *and* other CPUs. Data protected by it lives in a [`SchedCell`], which can only be borrowed by
//! presenting a guard of the owning lock.
//!
//! Note that the lock is **not** a general purpose mutex: it must only be held for short windows
//! and never across calls that can block. [`Spinlock`] is the plain alternative for bookkeeping
//! that doesn't need preemption suppressed.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod cell;
mod loom;
mod preempt;
mod sched_lock;
mod spinlock;

pub use cell::SchedCell;
#[cfg(any(test, feature = "std"))]
pub use preempt::StdPreemption;
pub use preempt::Preemption;
pub use sched_lock::{SchedLock, SchedLockGuard};
pub use spinlock::{RawSpinlock, Spinlock, SpinlockGuard};

/// Marker type which makes a guard neither `Send` nor `Sync`.
///
/// A guard stands for "this CPU holds the lock", so it must stay on that CPU and must not be
/// shared with another one either: borrowing a guard is what grants access to a
/// [`SchedCell`].
#[expect(dead_code, reason = "inner pointer is unused")]
pub(crate) struct GuardNoSendSync(*mut ());
