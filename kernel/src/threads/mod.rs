//! # The Thread Runtime
//!
//! Cooperative kernel threads on a single processor. Threads run until
//! they yield, sleep or exit; the timer interrupt adds preemption on
//! top by yielding the interrupted thread after each alarm drain.
//!
//! The scheduler singleton lives behind an [`IrqLock`] because the
//! timer interrupt reaches into it (to wake sleepers and to yield);
//! every public entry point here is therefore safe to call with
//! interrupts in any state.

pub mod context;
pub mod scheduler;
pub mod stack;
pub mod thread;

pub use scheduler::{Scheduler, SchedulerStats};
pub use thread::{Thread, ThreadId, ThreadPriority, ThreadState};

use crate::sync::{without_interrupts, IrqLock};

static SCHEDULER: IrqLock<Scheduler> = IrqLock::new(Scheduler::new());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    OutOfThreads,
    StackAllocationFailed,
}

/// What becomes of the current thread when it gives up the processor.
enum Disposition {
    /// Back to the ready queue; it will run again in turn
    Requeue,
    /// Out of the runnable pool until something wakes it
    Sleep,
    /// Gone for good
    Exit,
}

/// Initialize the thread runtime.
///
/// Spawns the idle thread, which guarantees the ready queue is never
/// empty: a sleeping thread can always be switched away from.
pub fn init() {
    spawn(idle_thread, ThreadPriority::Idle).expect("failed to spawn the idle thread");
}

/// Spawn a new kernel thread.
pub fn spawn(entry_point: fn() -> !, priority: ThreadPriority) -> Result<ThreadId, ThreadError> {
    SCHEDULER.lock().spawn(entry_point, priority)
}

/// The handle of the thread currently executing, if the runtime has
/// been started.
pub fn current() -> Option<ThreadId> {
    SCHEDULER.lock().current_thread_id()
}

/// Move a sleeping thread into the ready queue.
pub fn wake(id: ThreadId) {
    SCHEDULER.lock().make_ready(id);
}

/// Give up the remainder of this time slice without suspending.
pub fn yield_now() {
    switch_current(Disposition::Requeue);
}

/// Suspend the calling thread and schedule away.
///
/// Returns only after some later event calls [`wake`] with this
/// thread's handle and the scheduler picks it again. If nothing else
/// is runnable the call degrades to a no-op and the caller keeps the
/// processor; with the idle thread spawned this cannot happen.
pub fn sleep_current() {
    switch_current(Disposition::Sleep);
}

/// Exit the calling thread. Never returns.
pub fn exit_current() -> ! {
    switch_current(Disposition::Exit);
    // A finished thread is never selected again; reaching this loop
    // means the runtime was not started.
    loop {
        core::hint::spin_loop();
    }
}

/// The common yield path: update scheduler state under the lock, drop
/// the lock, then switch registers.
fn switch_current(disposition: Disposition) {
    without_interrupts(|| {
        let (should_switch, from, to) = {
            let mut sched = SCHEDULER.lock();
            if sched.current_thread_id().is_none() {
                return;
            }
            match disposition {
                Disposition::Requeue => {}
                Disposition::Sleep => sched.mark_current_sleeping(),
                Disposition::Exit => sched.mark_current_finished(),
            }
            sched.prepare_yield()
            // Lock drops here; the switch below must run lock-free,
            // since the thread we resume may itself need the scheduler
        };

        if should_switch {
            unsafe {
                context::switch_context(from, to);
            }
            // Back on this thread's stack, possibly much later
        } else if matches!(disposition, Disposition::Sleep) {
            // Nothing else was runnable; un-suspend and carry on
            SCHEDULER.lock().resume_current();
        }
    });
}

/// Hand the processor to the first thread. One-way: the boot stack is
/// abandoned.
pub fn start() -> ! {
    let first = SCHEDULER
        .lock()
        .prepare_start()
        .expect("start() with an empty ready queue");

    unsafe { context::switch_to_first(first) }
}

/// A snapshot of scheduler activity.
pub fn stats() -> SchedulerStats {
    SCHEDULER.lock().stats()
}

/// The idle thread: runs when nothing else can, halting the processor
/// until the next interrupt.
fn idle_thread() -> ! {
    loop {
        x86_64::instructions::hlt();
        yield_now();
    }
}
