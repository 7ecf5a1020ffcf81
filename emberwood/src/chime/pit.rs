//! # Programmable Interval Timer (8254)
//!
//! The hardware clock source behind the chime. Channel 0 is programmed as
//! a rate generator so it raises IRQ 0 `TICK_HZ` times per second.
//!
//! The command byte and the two divisor bytes below are a wire protocol:
//! the chip expects exactly this sequence on exactly these ports.

use x86_64::instructions::port::Port;

/// 8254 input frequency (Hz).
pub const PIT_BASE_HZ: u32 = 1193180;

/// Tick frequency (Hz). One tick is the kernel's unit of time.
pub const TICK_HZ: u32 = 100;

// The 8254 divisor is 16 bits, so frequencies below ~19 Hz cannot be
// expressed; above 1000 Hz the per-tick overhead stops being worth it.
const _: () = assert!(TICK_HZ >= 19, "8254 requires TICK_HZ >= 19");
const _: () = assert!(TICK_HZ <= 1000, "TICK_HZ <= 1000 recommended");

/// Channel 0 data port (system timer).
const CHANNEL0: u16 = 0x40;
/// Mode/command register.
const COMMAND: u16 = 0x43;

/// CW: counter 0, LSB then MSB, mode 2 (rate generator), binary.
const CMD_COUNTER0_RATE_GEN: u8 = 0x34;

/// Divisor for the requested frequency, rounded to nearest.
pub fn divisor(hz: u32) -> u16 {
    ((PIT_BASE_HZ + hz / 2) / hz) as u16
}

/// Program channel 0 to interrupt `hz` times per second.
///
/// # Safety
///
/// Writes to I/O ports. Must be called exactly once, before interrupts
/// are enabled. There is no failure path at this layer; if the port
/// writes do not reach the chip, the machine was never going to boot.
pub unsafe fn program(hz: u32) {
    let divisor = divisor(hz);
    let mut command: Port<u8> = Port::new(COMMAND);
    let mut channel0: Port<u8> = Port::new(CHANNEL0);

    command.write(CMD_COUNTER0_RATE_GEN);
    channel0.write((divisor & 0xff) as u8);
    channel0.write((divisor >> 8) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_byte_is_bit_exact() {
        // Counter 0 (00), lobyte/hibyte (11), mode 2 (010), binary (0).
        assert_eq!(CMD_COUNTER0_RATE_GEN, 0b00_11_010_0);
        assert_eq!(CMD_COUNTER0_RATE_GEN, 0x34);
    }

    #[test]
    fn divisor_rounds_to_nearest() {
        // 1193180 / 100 = 11931.8 -> 11932
        assert_eq!(divisor(100), 11932);
        // 1193180 / 1000 = 1193.18 -> 1193
        assert_eq!(divisor(1000), 1193);
    }

    #[test]
    fn divisor_fits_sixteen_bits_at_minimum_rate() {
        // 19 Hz is the slowest rate the 16-bit divisor can express.
        assert_eq!(divisor(19), 62799);
    }
}
