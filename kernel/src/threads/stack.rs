//! # Stack Allocation
//!
//! Each thread gets its own stack, carved from the kernel heap. The
//! scheduler keeps the `Stack` alive for as long as the thread exists;
//! dropping it returns the memory.

use alloc::alloc::{alloc, dealloc, Layout};
use core::ptr::NonNull;

/// Default stack size: 64 KB.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

/// Minimum stack size: one page.
pub const MIN_STACK_SIZE: usize = 4 * 1024;

/// Maximum stack size: 1 MB.
pub const MAX_STACK_SIZE: usize = 1024 * 1024;

/// A thread's stack allocation.
pub struct Stack {
    bottom: NonNull<u8>,
    size: usize,
}

// Heap-allocated memory; ownership moves with the scheduler.
unsafe impl Send for Stack {}
unsafe impl Sync for Stack {}

impl Stack {
    /// Allocate a stack of the default size.
    pub fn new() -> Option<Self> {
        Self::with_size(DEFAULT_STACK_SIZE)
    }

    /// Allocate a stack of `size` bytes, clamped to the valid range
    /// and rounded up to 16-byte alignment.
    pub fn with_size(size: usize) -> Option<Self> {
        let size = size.clamp(MIN_STACK_SIZE, MAX_STACK_SIZE);
        let size = (size + 15) & !15;

        let layout = Layout::from_size_align(size, 16).ok()?;
        let ptr = unsafe { alloc(layout) };

        NonNull::new(ptr).map(|bottom| Stack { bottom, size })
    }

    /// Low address of the stack.
    pub fn bottom(&self) -> u64 {
        self.bottom.as_ptr() as u64
    }

    /// High address of the stack; the stack grows down from here.
    pub fn top(&self) -> u64 {
        self.bottom() + self.size as u64
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether `addr` falls within this stack.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.bottom() && addr < self.top()
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // Layout was validated at allocation time
        let layout = Layout::from_size_align(self.size, 16)
            .expect("stack layout invalid during deallocation");

        unsafe {
            dealloc(self.bottom.as_ptr(), layout);
        }
    }
}
