//! Condition variable over a spin mutex.
//!
//! A waiter samples a generation counter while holding the mutex, releases
//! the mutex and relaxes until a notifier bumps the counter. Notifiers must
//! hold the same mutex while calling [`CondVar::notify_all`], which closes the
//! window between "predicate checked" and "started waiting": a wakeup can
//! never be lost, only observed as a spurious one.

use core::sync::atomic::{AtomicUsize, Ordering};

use spin::{Mutex, MutexGuard};

pub struct CondVar {
    generation: AtomicUsize,
}

impl Default for CondVar {
    fn default() -> Self {
        Self::new()
    }
}

impl CondVar {
    /// [CV1] New condition variable has no pending notification
    #[must_use]
    pub const fn new() -> Self {
        Self {
            generation: AtomicUsize::new(0),
        }
    }

    /// Release `guard`, wait for a notification, then re-acquire `mutex`.
    ///
    /// `relax` runs on every spin iteration; a kernel passes its scheduler
    /// yield here so the waiting thread does not monopolize the CPU.
    ///
    /// `guard` must have been obtained from `mutex`.
    pub fn wait_with<'a, T, R: FnMut()>(
        &self,
        mutex: &'a Mutex<T>,
        guard: MutexGuard<'a, T>,
        mut relax: R,
    ) -> MutexGuard<'a, T> {
        // [CV2] sampled under the lock, so any later notify changes it
        let seen = self.generation.load(Ordering::Acquire);
        drop(guard);

        while self.generation.load(Ordering::Acquire) == seen {
            relax();
            core::hint::spin_loop();
        }

        mutex.lock()
    }

    /// Wait until `condition` returns false, re-checking after every wakeup.
    pub fn wait_while_with<'a, T, F, R>(
        &self,
        mutex: &'a Mutex<T>,
        mut guard: MutexGuard<'a, T>,
        mut condition: F,
        mut relax: R,
    ) -> MutexGuard<'a, T>
    where
        F: FnMut(&mut T) -> bool,
        R: FnMut(),
    {
        // [CV3] predicate loop: a wakeup alone proves nothing
        while condition(&mut *guard) {
            guard = self.wait_with(mutex, guard, &mut relax);
        }
        guard
    }

    /// Wake every waiter. Call with the associated mutex held.
    pub fn notify_all(&self) {
        // [CV4] bump generation; waiters spinning on the old value fall through
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
