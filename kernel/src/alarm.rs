//! # The Alarm Service
//!
//! Timer-driven sleep and wake for kernel threads. A thread calls
//! [`wait_until`] to suspend itself for at least a requested number of
//! ticks; the timer interrupt calls [`on_timer_signal`] every period
//! to release every thread whose due time has arrived, then yields the
//! interrupted thread so the newly woken ones get a prompt scheduling
//! decision. That trailing yield is also what gives the kernel its
//! preemptive time slicing.
//!
//! Both sides touch the same pending set — one from thread context,
//! one from interrupt context — so every mutation happens under the
//! interrupt-disabling [`IrqLock`]. The interrupt side never blocks,
//! never allocates and never sleeps; its cost is proportional to the
//! number of entries it releases, not to the size of the set.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::sync::{without_interrupts, IrqLock};
use crate::threads::{self, ThreadId};
use crate::time;

/// The pending-wakeup set: absolute due tick to the threads suspended
/// until that tick.
///
/// Ordered by due time so a drain can stop at the first bucket that
/// has not yet come due. Several threads may share one due tick; they
/// are all released in the same pass, in no particular order among
/// themselves. A due time is never changed after insertion — entries
/// only ever leave by being released.
pub struct AlarmQueue {
    pending: BTreeMap<u64, Vec<ThreadId>>,
    waiting: usize,
}

impl AlarmQueue {
    pub const fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            waiting: 0,
        }
    }

    /// Record that `thread` must not run again before tick `due`.
    pub fn schedule(&mut self, due: u64, thread: ThreadId) {
        self.pending.entry(due).or_default().push(thread);
        self.waiting += 1;
    }

    /// Remove and return one thread whose due time has arrived, or
    /// `None` once every remaining entry is still in the future.
    ///
    /// Buckets come out in ascending due order, so repeated calls with
    /// the same `now` drain everything due without visiting anything
    /// that is not.
    pub fn pop_due(&mut self, now: u64) -> Option<ThreadId> {
        let mut entry = self.pending.first_entry()?;
        if *entry.key() > now {
            return None;
        }

        let thread = entry.get_mut().pop();
        if entry.get().is_empty() {
            entry.remove();
        }

        if thread.is_some() {
            self.waiting -= 1;
        }
        thread
    }

    /// The earliest outstanding due tick.
    pub fn next_due(&self) -> Option<u64> {
        self.pending.keys().next().copied()
    }

    /// How many threads are waiting on an alarm.
    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn is_empty(&self) -> bool {
        self.waiting == 0
    }
}

impl Default for AlarmQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The pending-wakeup set, shared between thread and interrupt
/// context. Lives for the whole life of the kernel.
static ALARM: IrqLock<AlarmQueue> = IrqLock::new(AlarmQueue::new());

/// Attach the alarm to the timer. Called once at boot; the kernel
/// supports exactly one alarm on exactly one timer source.
pub fn init() {
    time::set_tick_handler(on_timer_signal);
}

/// Suspend the calling thread for at least `duration` ticks.
///
/// The thread becomes runnable again on the first timer signal that
/// observes `ticks() >= now + duration` — possibly later, under
/// scheduler load, but never earlier. A `duration` of zero still
/// suspends: the caller always waits for a timer signal and is never
/// resumed synchronously.
///
/// Must be called from a running thread, never from interrupt context.
pub fn wait_until(duration: u64) {
    // Insertion and suspension form one indivisible unit with respect
    // to the timer interrupt: a signal after the insert sees the entry
    // and releases it; a signal before has nothing to release.
    without_interrupts(|| {
        let thread = threads::current().expect("wait_until called outside a scheduled thread");
        let due = time::ticks() + duration;

        ALARM.lock().schedule(due, thread);
        threads::sleep_current();
    });
}

/// The timer-signal handler: release every thread whose due time has
/// arrived, then yield.
///
/// Runs in interrupt context on every tick. `now` is read once at the
/// start of the scan; everything due at that instant is released in
/// this call, in non-decreasing due order, and nothing is ever
/// released twice.
pub fn on_timer_signal() {
    let now = time::ticks();

    {
        let mut alarm = ALARM.lock();
        while let Some(thread) = alarm.pop_due(now) {
            threads::wake(thread);
        }
    }

    // Give the woken threads a scheduling decision right away. The
    // interrupted thread goes back to the ready queue, which is what
    // makes the timer double as the preemption source.
    threads::yield_now();
}

/// How many threads are currently waiting on an alarm.
pub fn waiting() -> usize {
    ALARM.lock().waiting()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threads::{Scheduler, ThreadPriority, ThreadState};

    fn entry() -> ! {
        loop {}
    }

    /// Release everything due at `now`, in pop order.
    fn drain(queue: &mut AlarmQueue, now: u64) -> Vec<ThreadId> {
        let mut released = Vec::new();
        while let Some(thread) = queue.pop_due(now) {
            released.push(thread);
        }
        released
    }

    #[test]
    fn released_on_first_signal_at_or_after_due() {
        // Timer starts at 0, period 500. A sleeps 100 ticks, B sleeps
        // 1200; signals at 500, 1000, 1500.
        let mut queue = AlarmQueue::new();
        let (a, b) = (ThreadId(1), ThreadId(2));
        queue.schedule(100, a);
        queue.schedule(1200, b);

        assert_eq!(drain(&mut queue, 500), [a]);
        assert!(drain(&mut queue, 1000).is_empty());
        assert_eq!(drain(&mut queue, 1500), [b]);
        assert!(queue.is_empty());
    }

    #[test]
    fn never_released_early() {
        let mut queue = AlarmQueue::new();
        queue.schedule(100, ThreadId(1));

        assert_eq!(queue.pop_due(0), None);
        assert_eq!(queue.pop_due(99), None);
        assert_eq!(queue.pop_due(100), Some(ThreadId(1)));
    }

    #[test]
    fn no_double_release() {
        let mut queue = AlarmQueue::new();
        queue.schedule(10, ThreadId(1));

        assert_eq!(drain(&mut queue, 500).len(), 1);
        // Entry destroyed on release; later scans find nothing
        assert_eq!(drain(&mut queue, 500).len(), 0);
        assert_eq!(drain(&mut queue, 10_000).len(), 0);
        assert_eq!(queue.waiting(), 0);
    }

    #[test]
    fn scan_is_complete_and_stops_at_the_future() {
        let mut queue = AlarmQueue::new();
        for (due, id) in [(5, 1), (10, 2), (10, 3), (20, 4), (700, 5)] {
            queue.schedule(due, ThreadId(id));
        }

        let released = drain(&mut queue, 500);
        assert_eq!(released.len(), 4);
        assert!(!released.contains(&ThreadId(5)));

        // Nothing due at `now` remains after the scan
        assert_eq!(queue.next_due(), Some(700));
        assert_eq!(queue.waiting(), 1);
    }

    #[test]
    fn release_order_is_non_decreasing_in_due_time() {
        let mut queue = AlarmQueue::new();
        // Insert out of order
        for (due, id) in [(300, 1), (100, 2), (200, 3), (100, 4)] {
            queue.schedule(due, ThreadId(id));
        }

        let released = drain(&mut queue, 1000);
        let dues: Vec<u64> = released
            .iter()
            .map(|id| match id.0 {
                1 => 300,
                2 | 4 => 100,
                3 => 200,
                _ => unreachable!(),
            })
            .collect();
        assert!(dues.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn equal_due_times_coexist_and_release_together() {
        // Two threads both sleep 50 ticks at time 0; the signal at 500
        // releases both in a single pass.
        let mut queue = AlarmQueue::new();
        queue.schedule(50, ThreadId(1));
        queue.schedule(50, ThreadId(2));
        assert_eq!(queue.waiting(), 2);

        let mut released = drain(&mut queue, 500);
        released.sort_by_key(|id| id.0);
        assert_eq!(released, [ThreadId(1), ThreadId(2)]);
    }

    #[test]
    fn zero_duration_still_waits_for_a_signal() {
        // wait_until(0) books a wakeup at the current tick; the thread
        // is suspended regardless and released by the next scan.
        let mut sched = Scheduler::new();
        let mut queue = AlarmQueue::new();
        let a = sched.spawn(entry, ThreadPriority::Normal).unwrap();
        let _idle = sched.spawn(entry, ThreadPriority::Idle).unwrap();
        sched.prepare_start().unwrap();

        let now = 42;
        queue.schedule(now, a); // due = now + 0
        sched.mark_current_sleeping();
        let (switched, ..) = sched.prepare_yield();
        assert!(switched);
        assert_eq!(sched.state_of(a), Some(ThreadState::Sleeping));

        while let Some(thread) = queue.pop_due(now) {
            sched.make_ready(thread);
        }
        assert_eq!(sched.state_of(a), Some(ThreadState::Ready));
    }

    #[test]
    fn sleep_tick_wake_round_trip_through_the_scheduler() {
        // The full state machine, minus the register switch:
        // RUNNING --sleep--> SLEEPING --timer signal--> READY
        let mut sched = Scheduler::new();
        let mut queue = AlarmQueue::new();

        let a = sched.spawn(entry, ThreadPriority::Normal).unwrap();
        let b = sched.spawn(entry, ThreadPriority::Normal).unwrap();
        let _idle = sched.spawn(entry, ThreadPriority::Idle).unwrap();
        sched.prepare_start().unwrap();
        assert_eq!(sched.current_thread_id(), Some(a));

        // a sleeps until tick 100; b until tick 1200
        queue.schedule(100, a);
        sched.mark_current_sleeping();
        sched.prepare_yield();
        assert_eq!(sched.current_thread_id(), Some(b));

        queue.schedule(1200, b);
        sched.mark_current_sleeping();
        sched.prepare_yield();

        // Signal at 500: only a comes back
        while let Some(t) = queue.pop_due(500) {
            sched.make_ready(t);
        }
        assert_eq!(sched.state_of(a), Some(ThreadState::Ready));
        assert_eq!(sched.state_of(b), Some(ThreadState::Sleeping));

        // Signal at 1500: b follows
        while let Some(t) = queue.pop_due(1500) {
            sched.make_ready(t);
        }
        assert_eq!(sched.state_of(b), Some(ThreadState::Ready));
        assert!(queue.is_empty());
    }

    #[test]
    fn next_due_tracks_the_minimum() {
        let mut queue = AlarmQueue::new();
        assert_eq!(queue.next_due(), None);

        queue.schedule(30, ThreadId(1));
        queue.schedule(10, ThreadId(2));
        assert_eq!(queue.next_due(), Some(10));

        queue.pop_due(10);
        assert_eq!(queue.next_due(), Some(30));
    }
}
