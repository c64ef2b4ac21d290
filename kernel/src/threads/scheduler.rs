//! # The Scheduler
//!
//! Round-robin cooperative scheduling over a FIFO ready queue. All
//! state transitions happen here, under the caller's lock; the actual
//! register switch is performed by the caller *after* dropping the
//! lock, using the raw context pointers handed out by
//! [`Scheduler::prepare_yield`]. Switching while holding the lock
//! would leave it held by a thread that is no longer running.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use super::context::ThreadContext;
use super::stack::Stack;
use super::thread::{Thread, ThreadId, ThreadPriority, ThreadState};
use super::ThreadError;

const MAX_THREADS: usize = 64;

pub struct Scheduler {
    threads: Vec<Thread>,
    /// Stack storage; entry i backs thread i for the thread's lifetime
    stacks: Vec<Stack>,
    ready_queue: VecDeque<ThreadId>,
    current: Option<ThreadId>,
    next_id: u64,
    context_switches: u64,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {
            threads: Vec::new(),
            stacks: Vec::new(),
            ready_queue: VecDeque::new(),
            current: None,
            next_id: 1,
            context_switches: 0,
        }
    }

    /// Create a thread and place it on the ready queue.
    pub fn spawn(
        &mut self,
        entry_point: fn() -> !,
        priority: ThreadPriority,
    ) -> Result<ThreadId, ThreadError> {
        if self.threads.len() >= MAX_THREADS {
            return Err(ThreadError::OutOfThreads);
        }

        let id = ThreadId(self.next_id);
        self.next_id += 1;

        let stack = Stack::new().ok_or(ThreadError::StackAllocationFailed)?;
        let (bottom, top) = (stack.bottom(), stack.top());
        self.stacks.push(stack);

        self.threads
            .push(Thread::new(id, entry_point, priority, bottom, top));
        self.ready_queue.push_back(id);

        Ok(id)
    }

    pub fn current_thread_id(&self) -> Option<ThreadId> {
        self.current
    }

    /// Move a sleeping thread into the ready queue.
    ///
    /// This is the wake half of the suspend/resume pair: the alarm
    /// service calls it once per released wakeup. A thread enters the
    /// pending set at most once and each entry is removed exactly
    /// once, so any other state here is a corrupted invariant.
    pub fn make_ready(&mut self, id: ThreadId) {
        match self.find_mut(id) {
            Some(thread) if thread.state() == ThreadState::Sleeping => {
                thread.set_state(ThreadState::Ready);
                self.ready_queue.push_back(id);
            }
            Some(thread) => {
                debug_assert!(
                    false,
                    "make_ready on thread {} in state {:?}",
                    id.0,
                    thread.state()
                );
            }
            None => debug_assert!(false, "make_ready on unknown thread {}", id.0),
        }
    }

    /// Mark the running thread as suspended. It keeps the processor
    /// until the subsequent [`prepare_yield`](Self::prepare_yield)
    /// switches away, and will not be requeued by it.
    pub fn mark_current_sleeping(&mut self) {
        if let Some(id) = self.current {
            if let Some(thread) = self.find_mut(id) {
                thread.set_state(ThreadState::Sleeping);
            }
        }
    }

    /// Mark the running thread as exited; it is never scheduled again.
    pub fn mark_current_finished(&mut self) {
        if let Some(id) = self.current {
            if let Some(thread) = self.find_mut(id) {
                thread.set_state(ThreadState::Finished);
            }
        }
    }

    /// Undo [`mark_current_sleeping`](Self::mark_current_sleeping)
    /// when no other thread was runnable and the caller keeps running.
    pub fn resume_current(&mut self) {
        if let Some(id) = self.current {
            if let Some(thread) = self.find_mut(id) {
                if thread.state() == ThreadState::Sleeping {
                    thread.set_state(ThreadState::Running);
                }
            }
        }
    }

    /// Pick the next thread and update all scheduler state for a
    /// switch away from the current one.
    ///
    /// Returns `(should_switch, from, to)`. When `should_switch` is
    /// true the caller must drop the scheduler lock and call
    /// `context::switch_context(from, to)`; the pointers stay valid
    /// because thread slots are never removed.
    pub fn prepare_yield(&mut self) -> (bool, *mut ThreadContext, *const ThreadContext) {
        let no_switch = (false, core::ptr::null_mut(), core::ptr::null());

        let Some(current_id) = self.current else {
            return no_switch;
        };
        let Some(next_id) = self.select_next() else {
            // Nothing else runnable; the current thread keeps going
            return no_switch;
        };
        if next_id == current_id {
            return no_switch;
        }

        // A Running thread goes back to the ready queue; a Sleeping or
        // Finished one has already left the runnable pool.
        let requeue = match self.find_mut(current_id) {
            Some(current) => {
                current.record_yield();
                if current.state() == ThreadState::Running {
                    current.set_state(ThreadState::Ready);
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if requeue {
            self.ready_queue.push_back(current_id);
        }

        if let Some(next) = self.find_mut(next_id) {
            next.set_state(ThreadState::Running);
            next.record_time_slice();
        }

        self.current = Some(next_id);
        self.context_switches += 1;

        let from_idx = self.index_of(current_id);
        let to_idx = self.index_of(next_id);
        match (from_idx, to_idx) {
            (Some(from), Some(to)) => {
                let from_ctx = &mut self.threads[from].context as *mut ThreadContext;
                let to_ctx = &self.threads[to].context as *const ThreadContext;
                (true, from_ctx, to_ctx)
            }
            // Both ids came out of this table; this arm is unreachable
            // unless the table itself is corrupt.
            _ => no_switch,
        }
    }

    /// Select the first thread for the one-way boot handoff.
    ///
    /// Marks it current and returns its context for
    /// `context::switch_to_first`.
    pub fn prepare_start(&mut self) -> Option<*const ThreadContext> {
        let first_id = self.select_next()?;

        if let Some(thread) = self.find_mut(first_id) {
            thread.set_state(ThreadState::Running);
            thread.record_time_slice();
        }
        self.current = Some(first_id);
        self.context_switches += 1;

        let idx = self.index_of(first_id)?;
        Some(&self.threads[idx].context as *const ThreadContext)
    }

    /// Pop the next runnable thread, skipping finished slots.
    fn select_next(&mut self) -> Option<ThreadId> {
        loop {
            let id = self.ready_queue.pop_front()?;
            if let Some(thread) = self.find(id) {
                if thread.state() != ThreadState::Finished {
                    return Some(id);
                }
            }
        }
    }

    fn find(&self, id: ThreadId) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id() == id)
    }

    fn find_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|t| t.id() == id)
    }

    fn index_of(&self, id: ThreadId) -> Option<usize> {
        self.threads.iter().position(|t| t.id() == id)
    }

    pub fn state_of(&self, id: ThreadId) -> Option<ThreadState> {
        self.find(id).map(Thread::state)
    }

    pub fn stats(&self) -> SchedulerStats {
        let count = |state: ThreadState| self.threads.iter().filter(|t| t.state() == state).count();
        SchedulerStats {
            total_threads: self.threads.len(),
            ready_threads: count(ThreadState::Ready),
            sleeping_threads: count(ThreadState::Sleeping),
            context_switches: self.context_switches,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of scheduler activity.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerStats {
    pub total_threads: usize,
    pub ready_threads: usize,
    pub sleeping_threads: usize,
    pub context_switches: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> ! {
        loop {}
    }

    fn booted_with(n: usize) -> (Scheduler, Vec<ThreadId>) {
        let mut sched = Scheduler::new();
        let ids: Vec<ThreadId> = (0..n)
            .map(|_| sched.spawn(entry, ThreadPriority::Normal).expect("spawn"))
            .collect();
        sched.prepare_start().expect("no runnable thread");
        (sched, ids)
    }

    #[test]
    fn spawn_assigns_sequential_ids_and_enqueues_fifo() {
        let mut sched = Scheduler::new();
        let a = sched.spawn(entry, ThreadPriority::Normal).unwrap();
        let b = sched.spawn(entry, ThreadPriority::High).unwrap();
        assert_eq!(a, ThreadId(1));
        assert_eq!(b, ThreadId(2));

        // First spawned runs first
        assert!(sched.prepare_start().is_some());
        assert_eq!(sched.current_thread_id(), Some(a));
        assert_eq!(sched.state_of(a), Some(ThreadState::Running));
        assert_eq!(sched.state_of(b), Some(ThreadState::Ready));
    }

    #[test]
    fn yield_requeues_a_running_thread() {
        let (mut sched, ids) = booted_with(2);
        let (a, b) = (ids[0], ids[1]);

        let (switch, from, to) = sched.prepare_yield();
        assert!(switch);
        assert!(!from.is_null());
        assert!(!to.is_null());
        assert_eq!(sched.current_thread_id(), Some(b));
        assert_eq!(sched.state_of(a), Some(ThreadState::Ready));

        // Round-robin: a comes back after b yields
        sched.prepare_yield();
        assert_eq!(sched.current_thread_id(), Some(a));
    }

    #[test]
    fn sleeping_thread_is_not_requeued() {
        let (mut sched, ids) = booted_with(2);
        let (a, b) = (ids[0], ids[1]);

        sched.mark_current_sleeping();
        let (switch, ..) = sched.prepare_yield();
        assert!(switch);
        assert_eq!(sched.current_thread_id(), Some(b));
        assert_eq!(sched.state_of(a), Some(ThreadState::Sleeping));

        // b yields repeatedly; a never runs while asleep
        sched.prepare_yield();
        assert_eq!(sched.current_thread_id(), Some(b));

        sched.make_ready(a);
        assert_eq!(sched.state_of(a), Some(ThreadState::Ready));
        sched.prepare_yield();
        assert_eq!(sched.current_thread_id(), Some(a));
    }

    #[test]
    fn sleep_with_no_other_runnable_thread_resumes_in_place() {
        let (mut sched, ids) = booted_with(1);

        sched.mark_current_sleeping();
        let (switch, ..) = sched.prepare_yield();
        assert!(!switch);

        sched.resume_current();
        assert_eq!(sched.state_of(ids[0]), Some(ThreadState::Running));
    }

    #[test]
    fn finished_threads_are_never_selected() {
        let (mut sched, ids) = booted_with(2);
        let (a, b) = (ids[0], ids[1]);

        sched.mark_current_finished();
        let (switch, ..) = sched.prepare_yield();
        assert!(switch);
        assert_eq!(sched.current_thread_id(), Some(b));
        assert_eq!(sched.state_of(a), Some(ThreadState::Finished));

        // b keeps the processor from here on
        sched.prepare_yield();
        assert_eq!(sched.current_thread_id(), Some(b));
    }

    #[test]
    #[should_panic]
    fn waking_a_runnable_thread_is_a_bug() {
        let (mut sched, ids) = booted_with(2);
        sched.make_ready(ids[1]); // already Ready, not Sleeping
    }

    #[test]
    fn thread_table_is_bounded() {
        let mut sched = Scheduler::new();
        for _ in 0..MAX_THREADS {
            sched.spawn(entry, ThreadPriority::Normal).expect("spawn");
        }
        assert_eq!(
            sched.spawn(entry, ThreadPriority::Normal),
            Err(ThreadError::OutOfThreads)
        );
    }

    #[test]
    fn stats_track_states_and_switches() {
        let (mut sched, _ids) = booted_with(3);
        sched.mark_current_sleeping();
        sched.prepare_yield();

        let stats = sched.stats();
        assert_eq!(stats.total_threads, 3);
        assert_eq!(stats.sleeping_threads, 1);
        assert_eq!(stats.ready_threads, 1);
        // one for prepare_start, one for prepare_yield
        assert_eq!(stats.context_switches, 2);
    }
}
