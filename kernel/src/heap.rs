//! # Kernel Heap
//!
//! A bump allocator over a fixed region handed in at boot. Nothing in
//! this kernel frees long-lived allocations (thread stacks live as
//! long as their threads, the alarm map reuses its nodes), so a bump
//! pointer is enough; `dealloc` is a deliberate no-op.
//!
//! The cursor is advanced with a CAS loop so an allocation interrupted
//! by the timer cannot hand out a block twice.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr::null_mut;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct BumpAllocator {
    heap_end: AtomicUsize,
    next: AtomicUsize,
}

impl BumpAllocator {
    pub const fn new() -> Self {
        Self {
            heap_end: AtomicUsize::new(0),
            next: AtomicUsize::new(0),
        }
    }

    /// Hand the allocator its region.
    ///
    /// # Safety
    /// `heap_start..heap_start + heap_size` must be unused, writable
    /// memory; must be called before the first allocation.
    pub unsafe fn init(&self, heap_start: usize, heap_size: usize) {
        self.heap_end.store(heap_start + heap_size, Ordering::Release);
        self.next.store(heap_start, Ordering::Release);
    }

    /// Bytes handed out so far is not tracked; what remains is.
    pub fn remaining(&self) -> usize {
        self.heap_end
            .load(Ordering::Acquire)
            .saturating_sub(self.next.load(Ordering::Acquire))
    }
}

unsafe impl GlobalAlloc for BumpAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let size = layout.size();
        let align = layout.align();
        let end = self.heap_end.load(Ordering::Acquire);

        loop {
            let current = self.next.load(Ordering::Acquire);

            let aligned = match current.checked_add(align - 1) {
                Some(v) => v & !(align - 1),
                None => return null_mut(),
            };
            let new_next = match aligned.checked_add(size) {
                Some(v) => v,
                None => return null_mut(),
            };
            if new_next > end {
                return null_mut();
            }

            if self
                .next
                .compare_exchange(current, new_next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return aligned as *mut u8;
            }
        }
    }

    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {
        // Bump allocators don't reclaim individual allocations
    }
}

#[cfg_attr(not(test), global_allocator)]
static ALLOCATOR: BumpAllocator = BumpAllocator::new();

/// Initialize the kernel heap.
///
/// # Safety
/// See [`BumpAllocator::init`]. Must run before anything allocates —
/// in particular before any thread is spawned.
pub unsafe fn init(heap_start: usize, heap_size: usize) {
    ALLOCATOR.init(heap_start, heap_size);
}
