//! Interrupt-safe locking
//!
//! A spinlock that disables interrupts while held. This is the only lock
//! the timing core may use: the timer interrupt handler touches the same
//! state as thread-context callers, and the handler cannot block, so the
//! classic deadlock (thread takes lock, interrupt fires, handler spins on
//! the same lock forever) is ruled out by keeping interrupts masked for
//! the whole critical section.

use super::irq;
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// On a single core with interrupts masked while held, the lock is always
/// free when we reach for it; spinning this long means a logic error.
const MAX_SPINS: usize = 10_000_000;

pub struct InterruptSafeLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
    /// Names the lock in the deadlock diagnostic.
    debug_name: &'static str,
}

unsafe impl<T> Sync for InterruptSafeLock<T> {}
unsafe impl<T: Send> Send for InterruptSafeLock<T> {}

impl<T> InterruptSafeLock<T> {
    pub const fn new(data: T, debug_name: &'static str) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
            debug_name,
        }
    }

    /// Acquire the lock, returning a guard that releases it and restores
    /// the prior interrupt level on drop.
    pub fn lock(&self) -> InterruptSafeLockGuard<'_, T> {
        // Interrupts must go dark before we touch the lock word, or the
        // timer handler can fire between the two and spin on us.
        let restore_interrupts = irq::are_enabled();
        irq::disable();

        let mut spins = 0;
        while self.locked.swap(true, Ordering::Acquire) {
            core::hint::spin_loop();
            spins += 1;
            if spins == MAX_SPINS {
                panic!("deadlock on lock '{}'", self.debug_name);
            }
        }

        InterruptSafeLockGuard {
            lock: self,
            restore_interrupts,
        }
    }

    /// Whether the lock is currently held (diagnostic only).
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

pub struct InterruptSafeLockGuard<'a, T> {
    lock: &'a InterruptSafeLock<T>,
    restore_interrupts: bool,
}

impl<'a, T> Drop for InterruptSafeLockGuard<'a, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
        if self.restore_interrupts {
            irq::enable();
        }
    }
}

impl<'a, T> Deref for InterruptSafeLockGuard<'a, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for InterruptSafeLockGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}
