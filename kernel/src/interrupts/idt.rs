//! # Interrupt Descriptor Table
//!
//! One entry matters here: the timer vector. Its handler is a naked
//! routine because the tick path may context-switch away from the
//! handler frame — the caller-saved registers live on the interrupted
//! thread's stack, and are popped again whenever that thread resumes
//! and the handler finally returns through `iretq`.

use core::arch::naked_asm;

use lazy_static::lazy_static;
use x86_64::structures::idt::InterruptDescriptorTable;
use x86_64::VirtAddr;

use super::TIMER_VECTOR;

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        unsafe {
            idt[TIMER_VECTOR as usize]
                .set_handler_addr(VirtAddr::new(timer_handler as usize as u64));
        }
        idt
    };
}

/// Load the IDT into the CPU.
pub fn init() {
    IDT.load();
}

/// The timer interrupt entry point.
///
/// Saves the caller-saved registers the inner Rust code may clobber,
/// does the tick work, restores them and returns from the interrupt.
/// If the tick work yields, everything pushed here waits on the
/// interrupted thread's stack until it is scheduled again.
#[unsafe(naked)]
pub extern "C" fn timer_handler() {
    naked_asm!(
        "push rax",
        "push rcx",
        "push rdx",
        "push rsi",
        "push rdi",
        "push r8",
        "push r9",
        "push r10",
        "push r11",
        "call {inner}",
        "pop r11",
        "pop r10",
        "pop r9",
        "pop r8",
        "pop rdi",
        "pop rsi",
        "pop rdx",
        "pop rcx",
        "pop rax",
        "iretq",
        inner = sym timer_inner,
    );
}

extern "C" fn timer_inner() {
    // EOI must precede the tick work: the alarm's post-drain yield may
    // switch away from this handler, and the PIC has to be open for
    // the next period before that happens.
    super::end_of_interrupt(TIMER_VECTOR);

    crate::time::on_tick();
}
