//! # Interrupt Plumbing
//!
//! The chained 8259 PICs, remapped so IRQs 0-15 land on vectors 32-47,
//! and the IDT that routes the timer vector into the tick path. The
//! timer is the only hardware interrupt this kernel cares about.

pub mod idt;

use pic8259::ChainedPics;

use crate::sync::IrqLock;

/// IRQs 0-15 are remapped to interrupts 32-47.
pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

/// The timer line: IRQ 0, vector 32.
pub const TIMER_VECTOR: u8 = PIC_1_OFFSET;

/// The interrupt controllers. Interrupt-safe locked because the EOI
/// acknowledgement happens inside handlers.
pub static PICS: IrqLock<ChainedPics> =
    IrqLock::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

/// Remap the PICs and install the IDT. Interrupts stay disabled until
/// [`enable`] (or the first thread switch) turns them on.
pub fn init() {
    unsafe {
        PICS.lock().initialize();
    }
    idt::init();
}

/// Enable maskable interrupts on this processor.
pub fn enable() {
    x86_64::instructions::interrupts::enable();
}

/// Acknowledge an interrupt so the PIC will deliver the next one.
pub(crate) fn end_of_interrupt(vector: u8) {
    unsafe {
        PICS.lock().notify_end_of_interrupt(vector);
    }
}
