//! VGA Buffer - the kernel's first voice
//!
//! Early text output, available before anything else is initialized.

use core::fmt;
use lazy_static::lazy_static;
use spin::Mutex;

const BUFFER_HEIGHT: usize = 25;
const BUFFER_WIDTH: usize = 80;

/// Identity-mapped VGA text buffer.
pub const VGA_BUFFER_ADDRESS: usize = 0xB8000;

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
struct ColorCode(u8);

impl ColorCode {
    const fn new(foreground: Color, background: Color) -> ColorCode {
        ColorCode((background as u8) << 4 | (foreground as u8))
    }
}

pub struct Writer {
    column: usize,
    color_code: ColorCode,
}

impl Writer {
    fn cell(&self, row: usize, col: usize) -> *mut u16 {
        let offset = row * BUFFER_WIDTH + col;
        (VGA_BUFFER_ADDRESS as *mut u16).wrapping_add(offset)
    }

    fn put(&self, row: usize, col: usize, value: u16) {
        // Volatile: the buffer is device memory, not ordinary RAM.
        unsafe {
            core::ptr::write_volatile(self.cell(row, col), value);
        }
    }

    fn get(&self, row: usize, col: usize) -> u16 {
        unsafe { core::ptr::read_volatile(self.cell(row, col)) }
    }

    pub fn write_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.new_line(),
            byte => {
                if self.column >= BUFFER_WIDTH {
                    self.new_line();
                }
                let value = (self.color_code.0 as u16) << 8 | byte as u16;
                self.put(BUFFER_HEIGHT - 1, self.column, value);
                self.column += 1;
            }
        }
    }

    pub fn write_string(&mut self, s: &str) {
        for byte in s.bytes() {
            match byte {
                // Printable ASCII or newline.
                0x20..=0x7e | b'\n' => self.write_byte(byte),
                _ => self.write_byte(0xfe),
            }
        }
    }

    fn new_line(&mut self) {
        for row in 1..BUFFER_HEIGHT {
            for col in 0..BUFFER_WIDTH {
                let value = self.get(row, col);
                self.put(row - 1, col, value);
            }
        }
        self.clear_row(BUFFER_HEIGHT - 1);
        self.column = 0;
    }

    fn clear_row(&mut self, row: usize) {
        let blank = (self.color_code.0 as u16) << 8 | b' ' as u16;
        for col in 0..BUFFER_WIDTH {
            self.put(row, col, blank);
        }
    }
}

impl fmt::Write for Writer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_string(s);
        Ok(())
    }
}

lazy_static! {
    pub static ref WRITER: Mutex<Writer> = Mutex::new(Writer {
        column: 0,
        color_code: ColorCode::new(Color::LightGray, Color::Black),
    });
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::vga_buffer::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use core::fmt::Write;
    let _ = WRITER.lock().write_fmt(args);
}
