//! Interrupt flag access.
//!
//! Real builds read and write the CPU's IF flag. Test builds run in
//! ring 3 where `cli`/`sti` fault, so the flag is simulated per test
//! thread; the save/disable/restore logic above this module is the
//! same either way.

#[cfg(not(test))]
pub fn enabled() -> bool {
    x86_64::instructions::interrupts::are_enabled()
}

#[cfg(not(test))]
pub fn disable() {
    x86_64::instructions::interrupts::disable();
}

#[cfg(not(test))]
pub fn enable() {
    x86_64::instructions::interrupts::enable();
}

#[cfg(test)]
use core::cell::Cell;

#[cfg(test)]
std::thread_local! {
    static SIMULATED_IF: Cell<bool> = const { Cell::new(true) };
}

#[cfg(test)]
pub fn enabled() -> bool {
    SIMULATED_IF.with(|f| f.get())
}

#[cfg(test)]
pub fn disable() {
    SIMULATED_IF.with(|f| f.set(false));
}

#[cfg(test)]
pub fn enable() {
    SIMULATED_IF.with(|f| f.set(true));
}

/// Put the simulated flag in a known state at the start of a test.
#[cfg(test)]
pub fn force_for_test(state: bool) {
    SIMULATED_IF.with(|f| f.set(state));
}
