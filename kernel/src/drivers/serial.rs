//! Serial Port Driver (UART 16550)
//!
//! Boot-time logging over COM1. Guarded by a plain spinlock: nothing
//! on an interrupt path writes here, so the interrupt-disabling lock
//! is not needed.

use core::fmt;

use spin::Mutex;
use x86_64::instructions::port::Port;

/// COM1 base port.
const COM1: u16 = 0x3F8;

// Register offsets from the base
const DATA: u16 = 0; // Data (DLAB=0) / divisor LSB (DLAB=1)
const INT_ENABLE: u16 = 1; // Interrupt enable (DLAB=0) / divisor MSB (DLAB=1)
const FIFO_CTRL: u16 = 2;
const LINE_CTRL: u16 = 3;
const MODEM_CTRL: u16 = 4;
const LINE_STATUS: u16 = 5;

pub struct SerialPort {
    base: u16,
}

impl SerialPort {
    const fn new(base: u16) -> Self {
        Self { base }
    }

    fn port(&self, offset: u16) -> Port<u8> {
        Port::new(self.base + offset)
    }

    /// Initialize to 115200 baud, 8N1.
    ///
    /// # Safety
    /// Writes UART I/O ports; call once during boot.
    pub unsafe fn init(&mut self) {
        // Quiet the UART while reprogramming it
        self.port(INT_ENABLE).write(0x00);

        // DLAB on: the next two writes set the baud divisor (1 = 115200)
        self.port(LINE_CTRL).write(0x80);
        self.port(DATA).write(0x01);
        self.port(INT_ENABLE).write(0x00);

        // DLAB off, 8 data bits, no parity, 1 stop bit
        self.port(LINE_CTRL).write(0x03);

        // FIFO on, buffers cleared, 14-byte threshold
        self.port(FIFO_CTRL).write(0xC7);

        // DTR + RTS + OUT2
        self.port(MODEM_CTRL).write(0x0B);
    }

    /// Write one byte, waiting for the transmit buffer to drain.
    pub unsafe fn write_byte(&mut self, byte: u8) {
        while self.port(LINE_STATUS).read() & 0x20 == 0 {}
        self.port(DATA).write(byte);
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            unsafe {
                self.write_byte(byte);
            }
        }
        Ok(())
    }
}

static SERIAL1: Mutex<SerialPort> = Mutex::new(SerialPort::new(COM1));

/// Initialize COM1 (call once during boot).
pub unsafe fn init() {
    SERIAL1.lock().init();
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::drivers::serial::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => ($crate::serial_print!("{}\n", format_args!($($arg)*)));
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    // write_str is infallible for the UART
    let _ = SERIAL1.lock().write_fmt(args);
}
