//! # Time - The Kernel's Sense of Passage
//!
//! A single monotonic tick counter, advanced once per timer interrupt.
//! One subsystem may register a tick callback for the lifetime of the
//! kernel; the alarm service uses this to drive sleeping threads awake.

pub mod pit;

use core::sync::atomic::{AtomicU64, Ordering};

use spin::Once;

static TICKS: AtomicU64 = AtomicU64::new(0);

/// The single per-tick callback. Registered once, never replaced.
static TICK_HANDLER: Once<fn()> = Once::new();

/// Get the current tick count.
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Increment the tick count (called from the timer interrupt).
pub fn tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Register the callback invoked on every timer tick.
///
/// The kernel supports exactly one tick handler; registrations after
/// the first are ignored.
pub fn set_tick_handler(handler: fn()) {
    TICK_HANDLER.call_once(|| handler);
}

/// Called on each timer tick from the interrupt handler.
///
/// Advances the counter first, so the handler observes a time at or
/// after every due moment that has genuinely passed.
pub fn on_tick() {
    tick();

    if let Some(handler) = TICK_HANDLER.get() {
        handler();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::AtomicUsize;

    static HANDLER_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counting_handler() {
        HANDLER_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    fn other_handler() {
        HANDLER_CALLS.fetch_add(1000, Ordering::SeqCst);
    }

    // One test owns the global counter and handler slot; splitting
    // this up would race between parallel test threads.
    #[test]
    fn ticks_advance_and_handler_fires_once_registered() {
        let before = ticks();
        on_tick();
        assert_eq!(ticks(), before + 1);
        assert_eq!(HANDLER_CALLS.load(Ordering::SeqCst), 0);

        set_tick_handler(counting_handler);
        on_tick();
        on_tick();
        assert_eq!(ticks(), before + 3);
        assert_eq!(HANDLER_CALLS.load(Ordering::SeqCst), 2);

        // Second registration is ignored
        set_tick_handler(other_handler);
        on_tick();
        assert_eq!(HANDLER_CALLS.load(Ordering::SeqCst), 3);
    }
}
