//! Serial Port Driver (UART 16550)
//!
//! Thread-safe output to COM1; the panic handler and boot diagnostics
//! speak through here so they survive even when the VGA writer cannot.

use core::fmt;
use spin::Mutex;
use x86_64::instructions::port::Port;

/// COM1 base port.
const COM1: u16 = 0x3F8;

// Register offsets from the base.
const DATA: u16 = 0; // Data register (DLAB=0)
const INT_ENABLE: u16 = 1; // Interrupt Enable (DLAB=0)
const FIFO_CTRL: u16 = 2; // FIFO Control
const LINE_CTRL: u16 = 3; // Line Control
const MODEM_CTRL: u16 = 4; // Modem Control
const LINE_STATUS: u16 = 5; // Line Status

pub struct SerialPort {
    data: Port<u8>,
    int_enable: Port<u8>,
    fifo_ctrl: Port<u8>,
    line_ctrl: Port<u8>,
    modem_ctrl: Port<u8>,
    line_status: Port<u8>,
}

impl SerialPort {
    /// Create a port instance without touching the hardware.
    const fn new(base: u16) -> Self {
        Self {
            data: Port::new(base + DATA),
            int_enable: Port::new(base + INT_ENABLE),
            fifo_ctrl: Port::new(base + FIFO_CTRL),
            line_ctrl: Port::new(base + LINE_CTRL),
            modem_ctrl: Port::new(base + MODEM_CTRL),
            line_status: Port::new(base + LINE_STATUS),
        }
    }

    /// Initialize to 115200 baud, 8N1.
    pub unsafe fn init(&mut self) {
        self.int_enable.write(0x00); // no serial interrupts
        self.line_ctrl.write(0x80); // DLAB on
        self.data.write(0x01); // divisor LSB: 115200 baud
        self.int_enable.write(0x00); // divisor MSB
        self.line_ctrl.write(0x03); // 8 bits, no parity, 1 stop, DLAB off
        self.fifo_ctrl.write(0xC7); // FIFO on, cleared, 14-byte threshold
        self.modem_ctrl.write(0x0B); // DTR + RTS + OUT2
    }

    pub unsafe fn write_byte(&mut self, byte: u8) {
        // Wait for the transmit buffer to drain.
        while self.line_status.read() & 0x20 == 0 {}
        self.data.write(byte);
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
pub fn init() {
    unsafe {
        SERIAL1.lock().init();
    }
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
    let _ = SERIAL1.lock().write_fmt(args);
}
