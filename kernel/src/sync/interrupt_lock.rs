//! # Interrupt-Safe Locking
//!
//! A spinlock that disables interrupts while held. This prevents the
//! classic single-processor deadlock:
//!
//! 1. A thread acquires the lock
//! 2. The timer interrupt fires
//! 3. The handler tries to acquire the same lock
//! 4. Deadlock — the handler spins forever and the holder never runs
//!
//! With interrupts off for the lifetime of the guard, step 2 cannot
//! happen. The guard saves the prior interrupt state and restores it on
//! drop, so these locks nest correctly and can be taken from interrupt
//! context (where interrupts are already off) without side effects.
//!
//! Note that this excludes nothing on another processor; the whole
//! scheme assumes a single CPU. A multiprocessor port would need the
//! spin loop on the interrupt path as well.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use super::flags;

/// A spinlock whose guard holds interrupts disabled.
pub struct IrqLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for IrqLock<T> {}
unsafe impl<T: Send> Send for IrqLock<T> {}

impl<T> IrqLock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the lock, returning a guard that releases it and
    /// restores the prior interrupt state when dropped.
    pub fn lock(&self) -> IrqLockGuard<'_, T> {
        // Interrupts must go off before the spin, not after: if the
        // timer handler takes this lock, spinning with interrupts on
        // invites the deadlock described above.
        let were_enabled = flags::enabled();
        flags::disable();

        while self.locked.swap(true, Ordering::Acquire) {
            core::hint::spin_loop();
        }

        IrqLockGuard {
            lock: self,
            restore_interrupts: were_enabled,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

pub struct IrqLockGuard<'a, T> {
    lock: &'a IrqLock<T>,
    restore_interrupts: bool,
}

impl<T> Drop for IrqLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);

        if self.restore_interrupts {
            flags::enable();
        }
    }
}

impl<T> Deref for IrqLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for IrqLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}
