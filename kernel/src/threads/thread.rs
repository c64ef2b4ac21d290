//! Thread definitions.

use super::context::ThreadContext;

/// A unique, stable identifier for a thread.
///
/// Everything outside the scheduler — the alarm service included —
/// refers to threads only through this handle; the scheduler owns the
/// thread objects themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u64);

/// The state of a thread as the scheduler sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Currently executing on the processor
    Running,

    /// Runnable, waiting in the ready queue
    Ready,

    /// Suspended until some event (an alarm) makes it ready again
    Sleeping,

    /// Exited; its slot is never scheduled again
    Finished,
}

/// Priority levels, recorded at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ThreadPriority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
    Idle = 4,
}

/// A kernel thread.
pub struct Thread {
    pub(crate) id: ThreadId,
    pub(crate) state: ThreadState,
    pub(crate) priority: ThreadPriority,

    pub(crate) context: ThreadContext,

    /// Stack boundaries, kept for overflow diagnostics
    #[allow(dead_code)]
    pub(crate) stack_bottom: u64,
    #[allow(dead_code)]
    pub(crate) stack_top: u64,

    pub(crate) yields: u64,
    pub(crate) time_slices: u64,
}

impl Thread {
    pub fn new(
        id: ThreadId,
        entry_point: fn() -> !,
        priority: ThreadPriority,
        stack_bottom: u64,
        stack_top: u64,
    ) -> Self {
        Self {
            id,
            state: ThreadState::Ready,
            priority,
            context: ThreadContext::new(entry_point as u64, stack_top),
            stack_bottom,
            stack_top,
            yields: 0,
            time_slices: 0,
        }
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    pub fn set_state(&mut self, state: ThreadState) {
        self.state = state;
    }

    pub fn priority(&self) -> ThreadPriority {
        self.priority
    }

    /// Record that this thread gave up the processor.
    pub fn record_yield(&mut self) {
        self.yields += 1;
    }

    /// Record that this thread was handed the processor.
    pub fn record_time_slice(&mut self) {
        self.time_slices += 1;
    }
}
