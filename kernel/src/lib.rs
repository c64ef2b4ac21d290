//! # The Vesper Kernel
//!
//! A minimal cooperative-threading kernel for x86-64, built around one
//! idea: threads that sleep, and a timer that wakes them. The alarm
//! service owns the pending-wakeup set; the thread runtime supplies
//! suspend/resume; the PIT supplies the heartbeat. Everything the
//! timer interrupt shares with thread context is guarded by
//! interrupt-disabling locks, never by blocking mutexes.
//!
//! Boot sequence: [`init`] brings up serial logging, the heap, the
//! interrupt plumbing and the alarm, and spawns the idle thread;
//! [`run`] then hands the processor to the first thread and never
//! returns.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod alarm;
pub mod drivers;
pub mod heap;
pub mod interrupts;
pub mod sync;
pub mod threads;
pub mod time;

pub use alarm::wait_until;
pub use threads::{ThreadError, ThreadId, ThreadPriority, ThreadState};

/// Bring the kernel up. Interrupts stay off until the first thread
/// starts running.
///
/// # Safety
/// `heap_start..heap_start + heap_size` must be unused, writable
/// memory. Call exactly once, before [`run`].
pub unsafe fn init(heap_start: usize, heap_size: usize) {
    drivers::serial::init();
    serial_println!("vesper: serial up");

    heap::init(heap_start, heap_size);
    serial_println!("vesper: heap at {:#x}, {} KiB", heap_start, heap_size / 1024);

    interrupts::init();
    let pit = time::pit::Pit::new();
    pit.initialize();
    serial_println!("vesper: timer at {} Hz", pit.frequency());

    alarm::init();
    threads::init();
    serial_println!("vesper: alarm armed, idle thread spawned");
}

/// Enter the thread runtime. Never returns; from here on the timer
/// interrupt drives preemption and every alarm release.
pub fn run() -> ! {
    serial_println!("vesper: handing off to the first thread");
    threads::start()
}

/// Panics are invariant violations; there is nothing to recover.
#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    x86_64::instructions::interrupts::disable();
    serial_println!("vesper: PANIC: {}", info);
    loop {
        x86_64::instructions::hlt();
    }
}
