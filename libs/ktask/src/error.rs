// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// A POSIX error number.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    /// No such process.
    pub const ESRCH: Errno = Errno(3);
    /// Device or resource busy.
    pub const EBUSY: Errno = Errno(16);
    /// File exists.
    pub const EEXIST: Errno = Errno(17);
    /// Invalid argument.
    pub const EINVAL: Errno = Errno(22);
    /// Operation canceled.
    pub const ECANCELED: Errno = Errno(125);
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errno {}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// The identifier doesn't resolve to a live task. It has probably exited already.
    NotFound,
    /// Tearing down the target task failed. Carries the reason reported by the termination
    /// service.
    TerminationFailed(Errno),
    /// The identifier is reserved and can't name a task.
    InvalidId,
    /// A task with the same identifier is already registered.
    AlreadyExists,
}

impl Error {
    /// The error number this error is reported as through a POSIX interface.
    #[must_use]
    pub fn errno(self) -> Errno {
        match self {
            Error::NotFound => Errno::ESRCH,
            Error::TerminationFailed(errno) => errno,
            Error::InvalidId => Errno::EINVAL,
            Error::AlreadyExists => Errno::EEXIST,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound => f.write_str("no such task"),
            Error::TerminationFailed(errno) => write!(f, "failed to terminate task ({errno})"),
            Error::InvalidId => f.write_str("task identifier is reserved"),
            Error::AlreadyExists => f.write_str("a task with this identifier already exists"),
        }
    }
}

impl core::error::Error for Error {}

/// Returned to a task that has reached a cancellation point with a cancellation request pending.
///
/// The task must not continue the operation it was about to perform and should exit.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Canceled(pub(crate) ());

impl Canceled {
    #[must_use]
    pub fn errno(self) -> Errno {
        Errno::ECANCELED
    }
}

impl fmt::Display for Canceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad("canceled")
    }
}

impl core::error::Error for Canceled {}
