// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::num::NonZeroUsize;

/// The per-CPU hooks a [`SchedLock`](crate::SchedLock) needs from the platform.
///
/// # Safety
///
/// Implementations must uphold the following:
///
/// - [`Preemption::cpu_id`] returns a value that is unique among all contexts that can contend
///   for the same lock, and stays stable for as long as preemption is disabled.
/// - Between [`Preemption::disable`] and the matching [`Preemption::enable`] the calling context
///   is neither preempted, migrated to another CPU, nor interrupted by code that could observe
///   the protected state half-written. Calls nest; only the outermost `enable` may re-allow
///   preemption.
pub unsafe trait Preemption {
    /// Initial value for the hooks, allowing a lock to be created in a `static`.
    const INIT: Self;

    /// Returns a non-zero identifier for the calling CPU.
    fn cpu_id(&self) -> NonZeroUsize;

    /// Suppresses context switches on the calling CPU.
    fn disable(&self);

    /// Undoes one previous call to [`Preemption::disable`].
    fn enable(&self);
}

#[cfg(any(test, feature = "std"))]
pub use std_impl::StdPreemption;

#[cfg(any(test, feature = "std"))]
mod std_impl {
    use core::cell::Cell;
    use core::num::NonZeroUsize;
    use core::ptr;

    use super::Preemption;

    crate::loom::thread_local! {
        static DISABLED: Cell<usize> = Cell::new(0);
    }

    /// Hosted stand-in for a CPU: every OS thread counts as its own CPU, and "disabling
    /// preemption" only tracks a per-thread nesting depth so tests can assert when it's held.
    #[derive(Debug)]
    pub struct StdPreemption(());

    impl StdPreemption {
        /// Returns `true` if the calling thread currently has preemption disabled.
        #[must_use]
        pub fn is_disabled() -> bool {
            Self::disable_depth() > 0
        }

        /// Returns how many times the calling thread has disabled preemption without enabling it
        /// again.
        #[must_use]
        pub fn disable_depth() -> usize {
            DISABLED.with(Cell::get)
        }
    }

    // Safety: the address of a thread-local is unique among live threads and never changes during
    // a thread's lifetime. Threads are never migrated to other threads.
    unsafe impl Preemption for StdPreemption {
        const INIT: Self = StdPreemption(());

        fn cpu_id(&self) -> NonZeroUsize {
            DISABLED.with(|slot| {
                NonZeroUsize::new(ptr::from_ref(slot).addr())
                    .expect("thread-local address was zero")
            })
        }

        fn disable(&self) {
            DISABLED.with(|depth| {
                let next = depth
                    .get()
                    .checked_add(1)
                    .expect("preemption disable depth overflow");
                depth.set(next);
            });
        }

        fn enable(&self) {
            DISABLED.with(|depth| {
                let next = depth
                    .get()
                    .checked_sub(1)
                    .expect("preemption enabled more often than disabled");
                depth.set(next);
            });
        }
    }
}
