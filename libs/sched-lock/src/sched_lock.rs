// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic as core_atomic;

use crate::loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use crate::spinlock::spin_acquire;
use crate::{GuardNoSendSync, Preemption};

/// Source of [`SchedLock`] identities. Zero is never handed out.
static NEXT_LOCK_ID: core_atomic::AtomicUsize = core_atomic::AtomicUsize::new(1);

/// The scheduler lock.
///
/// A re-entrant, counting lock that keeps the owning CPU from being preempted while held:
///
/// - Acquiring disables preemption on the calling CPU *before* contending for the lock, so an
///   interrupt handler can never observe the lock held by the very context it interrupted in a
///   half-updated state.
/// - Acquiring it again from the owning CPU only bumps the nesting depth.
/// - Releasing the outermost guard hands the lock back and re-enables preemption.
///
/// The lock is global in the sense that exactly one CPU can hold it at any time, which gives the
/// cross-core quiescence needed to read another task's scheduler state consistently.
///
/// Hold it for as short as possible and **never** across a call that can block.
pub struct SchedLock<P: Preemption> {
    preempt: P,
    /// `cpu_id` of the owning CPU, zero when unlocked.
    owner: AtomicUsize,
    /// Nesting depth. Only ever touched by the owning CPU.
    depth: AtomicUsize,
    locked: AtomicBool,
    /// Identity handed to [`SchedCell`](crate::SchedCell)s, assigned on first use. Travels with
    /// the lock when it is moved, unlike its address.
    id: core_atomic::AtomicUsize,
}

/// An RAII guard for the [`SchedLock`]. Dropping it releases one level of nesting.
///
/// Guards are bound to the CPU that acquired them: they are neither `Send` nor `Sync`. Sharing
/// `&SchedLockGuard` with another thread would let both borrow the same
/// [`SchedCell`](crate::SchedCell) contents at once, so the following must not compile:
///
/// ```compile_fail
/// use core::num::NonZeroUsize;
/// use sched_lock::{Preemption, SchedLock};
///
/// struct Cpu;
///
/// unsafe impl Preemption for Cpu {
///     const INIT: Self = Cpu;
///     fn cpu_id(&self) -> NonZeroUsize {
///         NonZeroUsize::MIN
///     }
///     fn disable(&self) {}
///     fn enable(&self) {}
/// }
///
/// let lock = SchedLock::<Cpu>::new();
/// let guard = lock.lock();
/// std::thread::scope(|s| {
///     s.spawn(|| drop(&guard));
/// });
/// ```
#[clippy::has_significant_drop]
#[must_use = "if unused the SchedLock will immediately unlock"]
pub struct SchedLockGuard<'a, P: Preemption> {
    lock: &'a SchedLock<P>,
    marker: PhantomData<GuardNoSendSync>,
}

impl<P: Preemption> SchedLock<P> {
    /// Creates a new, unlocked scheduler lock.
    #[cfg(not(loom))]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            preempt: P::INIT,
            owner: AtomicUsize::new(0),
            depth: AtomicUsize::new(0),
            locked: AtomicBool::new(false),
            id: core_atomic::AtomicUsize::new(0),
        }
    }

    /// Creates a new, unlocked scheduler lock.
    #[cfg(loom)]
    #[must_use]
    pub fn new() -> Self {
        Self {
            preempt: P::INIT,
            owner: AtomicUsize::new(0),
            depth: AtomicUsize::new(0),
            locked: AtomicBool::new(false),
            id: core_atomic::AtomicUsize::new(0),
        }
    }

    /// Acquires the lock, spinning until it is available.
    ///
    /// If the calling CPU already holds the lock this only increments the nesting depth.
    ///
    /// # Panics
    ///
    /// Panics if the nesting depth overflows.
    #[inline]
    pub fn lock(&self) -> SchedLockGuard<'_, P> {
        self.preempt.disable();

        let cpu = self.preempt.cpu_id().get();
        if self.owner.load(Ordering::Relaxed) == cpu {
            self.nest();
        } else {
            spin_acquire(|| self.try_acquire(), || self.is_locked());
            self.claim(cpu);
        }

        SchedLockGuard {
            lock: self,
            marker: PhantomData,
        }
    }

    /// Attempts to acquire the lock without spinning.
    ///
    /// # Panics
    ///
    /// Panics if the nesting depth overflows.
    #[inline]
    pub fn try_lock(&self) -> Option<SchedLockGuard<'_, P>> {
        self.preempt.disable();

        let cpu = self.preempt.cpu_id().get();
        if self.owner.load(Ordering::Relaxed) == cpu {
            self.nest();
        } else if self.try_acquire() {
            self.claim(cpu);
        } else {
            self.preempt.enable();
            return None;
        }

        Some(SchedLockGuard {
            lock: self,
            marker: PhantomData,
        })
    }

    /// Returns `true` if any CPU currently holds the lock.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }

    /// Returns `true` if the calling CPU holds the lock.
    #[inline]
    pub fn is_owned_by_current_cpu(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == self.preempt.cpu_id().get()
    }

    /// Returns how many guards the calling CPU currently holds, zero if it doesn't own the lock.
    pub fn depth(&self) -> usize {
        if self.is_owned_by_current_cpu() {
            self.depth.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    /// Returns this lock's identity, assigning one if it has none yet.
    pub(crate) fn id(&self) -> usize {
        match self.id.load(core_atomic::Ordering::Relaxed) {
            0 => {
                let fresh = NEXT_LOCK_ID.fetch_add(1, core_atomic::Ordering::Relaxed);
                match self.id.compare_exchange(
                    0,
                    fresh,
                    core_atomic::Ordering::Relaxed,
                    core_atomic::Ordering::Relaxed,
                ) {
                    Ok(_) => fresh,
                    // another CPU assigned one first
                    Err(id) => id,
                }
            }
            id => id,
        }
    }

    fn try_acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    fn nest(&self) {
        let depth = self
            .depth
            .load(Ordering::Relaxed)
            .checked_add(1)
            .expect("SchedLock nesting depth overflow");
        self.depth.store(depth, Ordering::Relaxed);
    }

    fn claim(&self, cpu: usize) {
        self.owner.store(cpu, Ordering::Relaxed);
        debug_assert_eq!(self.depth.load(Ordering::Relaxed), 0);
        self.depth.store(1, Ordering::Relaxed);
    }

    /// Releases one level of nesting.
    ///
    /// # Safety
    ///
    /// The calling CPU must own the lock and give up exactly one guard.
    unsafe fn unlock(&self) {
        let depth = self.depth.load(Ordering::Relaxed);
        debug_assert!(depth > 0, "SchedLock released more often than acquired");
        let depth = depth - 1;
        self.depth.store(depth, Ordering::Relaxed);

        if depth == 0 {
            self.owner.store(0, Ordering::Relaxed);
            self.locked.store(false, Ordering::Release);
        }

        self.preempt.enable();
    }
}

impl<P: Preemption> Default for SchedLock<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Preemption> fmt::Debug for SchedLock<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedLock")
            .field("locked", &self.is_locked())
            .field("owner", &self.owner.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<'a, P: Preemption> SchedLockGuard<'a, P> {
    /// Returns the lock this guard belongs to.
    pub fn sched_lock(s: &Self) -> &'a SchedLock<P> {
        s.lock
    }
}

impl<P: Preemption> Drop for SchedLockGuard<'_, P> {
    #[inline]
    fn drop(&mut self) {
        // Safety: a guard always represents one level of nesting held by this CPU.
        unsafe {
            self.lock.unlock();
        }
    }
}

impl<P: Preemption> fmt::Debug for SchedLockGuard<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedLockGuard")
            .field("depth", &self.lock.depth.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
