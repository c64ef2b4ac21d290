//! # Thread Context
//!
//! The saved CPU state of a thread that is not running. Cooperative
//! switches happen at a function-call boundary, so only the registers
//! the SysV ABI makes the callee preserve need to survive, plus the
//! instruction pointer, stack pointer and flags.

use core::arch::naked_asm;

/// Saved CPU state for a suspended thread.
///
/// Field order is load-bearing: the switch routines below address the
/// struct by byte offset.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ThreadContext {
    // Callee-saved registers (offsets 0x00..0x28)
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbp: u64,
    pub rbx: u64,

    pub rip: u64,    // 0x30 - where to resume
    pub rsp: u64,    // 0x38
    pub rflags: u64, // 0x40 - carries the interrupt flag across a switch
}

impl ThreadContext {
    /// Context for a thread that has never run, poised to enter
    /// `entry_point` on its own stack.
    pub fn new(entry_point: u64, stack_top: u64) -> Self {
        ThreadContext {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            rbp: 0,
            rbx: 0,
            rip: entry_point,
            // The ABI expects RSP misaligned by 8 at function entry,
            // as if a call had just pushed a return address.
            rsp: stack_top - 8,
            // IF set: a fresh thread starts with interrupts enabled
            rflags: 0x202,
        }
    }

    pub const fn empty() -> Self {
        ThreadContext {
            r15: 0,
            r14: 0,
            r13: 0,
            r12: 0,
            rbp: 0,
            rbx: 0,
            rip: 0,
            rsp: 0,
            rflags: 0,
        }
    }
}

/// Save the current thread's state into `old` and resume `new`.
///
/// Returns (much) later, when some other switch restores `old`.
///
/// # Safety
/// Both pointers must be valid for the duration of the switch, and the
/// caller must hold interrupts disabled; the restored RFLAGS decides
/// when they come back on.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_old: *mut ThreadContext, _new: *const ThreadContext) {
    naked_asm!(
        // rdi = old context, rsi = new context

        // Save callee-saved registers
        "mov [rdi + 0x00], r15",
        "mov [rdi + 0x08], r14",
        "mov [rdi + 0x10], r13",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], rbp",
        "mov [rdi + 0x28], rbx",
        // RIP: our return address is on the stack
        "mov rax, [rsp]",
        "mov [rdi + 0x30], rax",
        // RSP as it was before the call pushed that return address
        "lea rax, [rsp + 8]",
        "mov [rdi + 0x38], rax",
        // RFLAGS
        "pushfq",
        "pop rax",
        "mov [rdi + 0x40], rax",
        // Restore the new thread
        "mov r15, [rsi + 0x00]",
        "mov r14, [rsi + 0x08]",
        "mov r13, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov rbp, [rsi + 0x20]",
        "mov rbx, [rsi + 0x28]",
        "mov rsp, [rsi + 0x38]",
        // Return address for the ret below
        "push qword ptr [rsi + 0x30]",
        // RFLAGS last. Do NOT force interrupts on here: the saved IF
        // state belongs to the new thread, and callers rely on
        // interrupts staying off until their critical section ends.
        "push qword ptr [rsi + 0x40]",
        "popfq",
        "ret",
    );
}

/// One-way switch from boot code into the first thread.
///
/// Nothing is saved: the bootstrap stack is abandoned, never to be
/// resumed.
///
/// # Safety
/// `new` must point at a context built by [`ThreadContext::new`].
#[unsafe(naked)]
pub unsafe extern "C" fn switch_to_first(_new: *const ThreadContext) -> ! {
    naked_asm!(
        // rdi = new context
        "mov rax, [rdi + 0x30]", // entry point
        "mov rsp, [rdi + 0x38]",
        // Clear the frame pointer: this is the bottom of the call stack
        "xor rbp, rbp",
        // The first thread runs with interrupts on; from here the
        // timer drives all further scheduling
        "sti",
        "jmp rax",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_enters_at_entry_point() {
        let ctx = ThreadContext::new(0x1000, 0x5000);
        assert_eq!(ctx.rip, 0x1000);
        assert_eq!(ctx.rsp, 0x5000 - 8);
        assert_ne!(ctx.rflags & 0x200, 0); // IF set
    }

    #[test]
    fn empty_context_is_zeroed() {
        let ctx = ThreadContext::empty();
        assert_eq!(ctx.rip, 0);
        assert_eq!(ctx.rsp, 0);
        assert_eq!(ctx.rflags, 0);
    }

    #[test]
    fn switch_routines_assume_this_layout() {
        // The asm offsets above must track the struct layout.
        assert_eq!(core::mem::offset_of!(ThreadContext, rbx), 0x28);
        assert_eq!(core::mem::offset_of!(ThreadContext, rip), 0x30);
        assert_eq!(core::mem::offset_of!(ThreadContext, rsp), 0x38);
        assert_eq!(core::mem::offset_of!(ThreadContext, rflags), 0x40);
    }
}
