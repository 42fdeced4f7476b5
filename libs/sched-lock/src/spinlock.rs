// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::hint;
use core::sync::atomic::{AtomicBool, Ordering};

/// Upper bound for the pause between two looks at a held lock, in spin loop hints.
const MAX_PAUSE: u32 = 64;

/// Test-and-test-and-set acquisition used by both [`Spinlock`] and
/// [`SchedLock`](crate::SchedLock).
///
/// Retries `try_acquire` until it succeeds. After a failed attempt, waits for `is_held` to
/// report the lock free before trying again, so waiters spin on a shared cache line instead of
/// bouncing it with writes. The pause between two looks doubles up to [`MAX_PAUSE`].
pub(crate) fn spin_acquire(mut try_acquire: impl FnMut() -> bool, is_held: impl Fn() -> bool) {
    let mut pause = 1;
    while !try_acquire() {
        while is_held() {
            for _ in 0..pause {
                // Loom (and the std test harness, when threads outnumber cores) must get a
                // chance to run the holder. See https://github.com/tokio-rs/loom/issues/162
                #[cfg(any(test, loom))]
                crate::loom::thread::yield_now();

                hint::spin_loop();
            }
            pause = (pause * 2).min(MAX_PAUSE);
        }
    }
}

/// A plain, non re-entrant spin mutex.
///
/// Unlike [`SchedLock`](crate::SchedLock) this lock does **not** touch preemption, so it must
/// never be taken from interrupt context. It is meant for bookkeeping such as registry maps.
pub type Spinlock<T> = lock_api::Mutex<RawSpinlock, T>;
pub type SpinlockGuard<'a, T> = lock_api::MutexGuard<'a, RawSpinlock, T>;

pub struct RawSpinlock(AtomicBool);

impl RawSpinlock {
    fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

// Safety: the flag only becomes `true` through a successful acquire compare-exchange and is
// reset by the holder with release ordering, so at most one holder exists at a time.
unsafe impl lock_api::RawMutex for RawSpinlock {
    type GuardMarker = lock_api::GuardSend;

    const INIT: Self = Self(AtomicBool::new(false));

    fn lock(&self) {
        spin_acquire(|| self.try_acquire(), || self.is_locked());
    }

    fn try_lock(&self) -> bool {
        self.try_acquire()
    }

    unsafe fn unlock(&self) {
        self.0.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn try_lock() {
        let lock = Spinlock::new(42);

        let a = lock.try_lock();
        assert_eq!(a.as_deref().copied(), Some(42));
        assert!(lock.try_lock().is_none());

        drop(a);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn spin_acquire_waits_for_release() {
        let held = Arc::new(AtomicBool::new(true));
        let released = Arc::new(AtomicBool::new(false));

        let releaser = {
            let held = held.clone();
            let released = released.clone();
            thread::spawn(move || {
                thread::yield_now();
                released.store(true, Ordering::Relaxed);
                held.store(false, Ordering::Release);
            })
        };

        spin_acquire(
            || {
                held.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            },
            || held.load(Ordering::Relaxed),
        );

        // acquiring synchronized with the release, so the marker store is visible
        assert!(released.load(Ordering::Relaxed));
        assert!(held.load(Ordering::Relaxed));
        releaser.join().unwrap();
    }

    #[test]
    fn contended_increments() {
        const THREADS: usize = 4;
        const ITERS: usize = 500;

        let lock = Arc::new(Spinlock::new(0_usize));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let lock = lock.clone();
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        *lock.lock() += 1;
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(*lock.lock(), THREADS * ITERS);
    }
}
