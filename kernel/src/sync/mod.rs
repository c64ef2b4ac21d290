//! # Synchronization Primitives
//!
//! Everything here follows one rule: code that shares state with an
//! interrupt handler must never block on a lock. The only exclusion
//! mechanism is "save the interrupt flag, disable, mutate, restore" —
//! a blocking mutex would deadlock the moment the handler that would
//! release it is the thing being waited for.

mod flags;
pub mod interrupt_lock;

pub use interrupt_lock::{IrqLock, IrqLockGuard};

/// Execute a closure with interrupts disabled, restoring the prior
/// interrupt state afterwards.
///
/// Nestable: an inner call observes interrupts already disabled and
/// restores nothing, so the outermost caller decides when interrupts
/// come back on.
pub fn without_interrupts<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let were_enabled = flags::enabled();
    if were_enabled {
        flags::disable();
    }

    let result = f();

    if were_enabled {
        flags::enable();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_interrupts_restores_prior_state() {
        flags::force_for_test(true);
        without_interrupts(|| {
            assert!(!flags::enabled());
        });
        assert!(flags::enabled());
    }

    #[test]
    fn without_interrupts_nests() {
        flags::force_for_test(true);
        without_interrupts(|| {
            without_interrupts(|| {
                assert!(!flags::enabled());
            });
            // Inner region must not re-enable on exit
            assert!(!flags::enabled());
        });
        assert!(flags::enabled());
    }
}
