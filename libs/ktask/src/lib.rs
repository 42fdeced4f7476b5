// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Task deletion with pthread-style cancellation semantics.
//!
//! [`TaskDeleter::delete`] terminates a task, but only as far as the task's own cancellation
//! state allows. Every deletion request ends in exactly one of the following outcomes:
//!
//! | Target state                                   | Outcome                                      |
//! |------------------------------------------------|----------------------------------------------|
//! | not registered                                 | [`Error::NotFound`], nothing changes         |
//! | cancelability disabled                         | request held pending                         |
//! | deferred, not in a cancellation point          | request held pending                         |
//! | deferred, blocked in a cancellation point      | request held pending, task woken up          |
//! | asynchronous, another task                     | torn down through the [`Terminator`]         |
//! | asynchronous, the calling task                 | [`ProcessExit::exit_success`], never returns |
//!
//! The decision is made with the scheduler lock ([`sched_lock::SchedLock`]) held, so it is
//! atomic with respect to interrupts, other CPUs and the target changing its own cancellation
//! state. The lock is released before any teardown happens.
//!
//! # Pending requests
//!
//! A pending request is a single sticky bit: deleting a task twice is no different from deleting
//! it once. The bit is only cleared by the target itself, when it acts on the request at a
//! cancellation point ([`CancellationPoint`]) or in [`test_cancel`]. Until then the request may
//! stay pending indefinitely, there is no timeout.
//!
//! # Collaborators
//!
//! Looking tasks up, waking blocked tasks, tearing tasks down and exiting are the kernel's job,
//! see the traits in [`services`]. [`TaskTable`] is a ready-made [`TaskRegistry`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod cancel;
mod cancel_point;
mod delete;
mod error;
mod id;
mod loom;
pub mod services;
mod table;
mod task;
#[cfg(test)]
mod test_util;

pub use cancel::{CancelFlags, CancelSnapshot, CancelState, CancelType, Cancelability};
#[cfg(feature = "cancellation-points")]
pub use cancel_point::CancellationPoint;
pub use cancel_point::{set_cancel_type, set_cancelability, test_cancel};
pub use delete::TaskDeleter;
pub use error::{Canceled, Errno, Error};
pub use id::TaskId;
pub use services::{CancelNotifier, ProcessExit, TaskRegistry, Terminator};
pub use table::TaskTable;
pub use task::{DeletableKind, TaskControl, TaskKind, UnsupportedKind};
