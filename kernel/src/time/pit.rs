//! # Programmable Interval Timer (PIT)
//!
//! The Intel 8253/8254 PIT, channel 0, in square-wave mode: the
//! heartbeat that delivers the periodic timer interrupt on IRQ 0.
//! Every sleep, wake and time slice in the kernel is downstream of the
//! divisor programmed here.

use x86_64::instructions::port::Port;

/// Channel 0 data port (system timer) and the mode/command register.
const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

/// PIT input frequency (Hz), fixed by the hardware.
const PIT_BASE_FREQ: u32 = 1_193_182;

/// Default timer frequency: 100 Hz (10 ms per tick).
const DEFAULT_FREQ: u32 = 100;

/// The slowest rate whose divisor still fits the 16-bit latch.
const MIN_FREQ: u32 = 19;

/// Command byte: channel 0, lobyte/hibyte access, mode 3 (square
/// wave), binary counting.
const CMD_CHANNEL0_MODE3: u8 = 0b00_11_011_0;

/// Channel 0 configuration for the system timer.
pub struct Pit {
    frequency: u32,
    divisor: u16,
}

impl Pit {
    /// PIT configuration at the default frequency.
    pub const fn new() -> Self {
        Pit {
            frequency: DEFAULT_FREQ,
            divisor: (PIT_BASE_FREQ / DEFAULT_FREQ) as u16,
        }
    }

    /// PIT configuration for a requested frequency in Hz.
    ///
    /// The request is clamped to what the 16-bit divisor can express;
    /// the stored frequency is the actual rate after integer division.
    pub fn with_frequency(freq: u32) -> Self {
        let freq = freq.clamp(MIN_FREQ, PIT_BASE_FREQ);
        let divisor = (PIT_BASE_FREQ / freq) as u16;
        let actual = PIT_BASE_FREQ / divisor as u32;

        Pit {
            frequency: actual,
            divisor,
        }
    }

    /// Program channel 0 and start the periodic interrupt stream.
    ///
    /// # Safety
    /// Writes PIT I/O ports; call once during boot, before interrupts
    /// are enabled.
    pub unsafe fn initialize(&self) {
        let mut command: Port<u8> = Port::new(PIT_COMMAND);
        let mut channel0: Port<u8> = Port::new(PIT_CHANNEL0);

        command.write(CMD_CHANNEL0_MODE3);

        // Divisor goes out low byte first, then high byte
        channel0.write((self.divisor & 0xFF) as u8);
        channel0.write((self.divisor >> 8) as u8);
    }

    /// The actual interrupt frequency in Hz.
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// The programmed divisor value.
    pub fn divisor(&self) -> u16 {
        self.divisor
    }
}

impl Default for Pit {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_100hz() {
        let pit = Pit::new();
        assert_eq!(pit.frequency(), 100);
        assert_eq!(pit.divisor(), 11931);
    }

    #[test]
    fn divisor_always_fits_the_latch() {
        // The minimum frequency is chosen so the divisor never
        // truncates when narrowed to u16.
        for freq in [MIN_FREQ, 100, 1000, PIT_BASE_FREQ] {
            let pit = Pit::with_frequency(freq);
            assert_eq!(
                pit.divisor() as u32,
                PIT_BASE_FREQ / (PIT_BASE_FREQ / pit.divisor() as u32)
            );
            assert!(pit.divisor() >= 1);
        }
    }

    #[test]
    fn requests_are_clamped() {
        let too_slow = Pit::with_frequency(1);
        assert_eq!(too_slow.frequency(), PIT_BASE_FREQ / (PIT_BASE_FREQ / MIN_FREQ));

        let too_fast = Pit::with_frequency(u32::MAX);
        assert_eq!(too_fast.divisor(), 1);
        assert_eq!(too_fast.frequency(), PIT_BASE_FREQ);
    }

    #[test]
    fn stored_frequency_reflects_integer_division() {
        let pit = Pit::with_frequency(144);
        assert_eq!(pit.divisor() as u32, PIT_BASE_FREQ / 144);
        assert_eq!(pit.frequency(), PIT_BASE_FREQ / pit.divisor() as u32);
    }
}
