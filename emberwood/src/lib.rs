//! # Emberwood - The EmberOS Kernel Library
//!
//! The living core of EmberOS, pared down to its heartbeat:
//! - The Chime (hardware clock, tick counter, sleep/wake)
//! - The Hearth (ready queue and sleeping set)
//! - The Vigil (interrupt layer)

#![no_std]
#![cfg_attr(target_os = "none", feature(abi_x86_interrupt))]

// The test harness runs on the host and brings std with it.
#[cfg(test)]
extern crate std;

pub mod chime;
pub mod drivers;
pub mod hearth;
pub mod vga_buffer;
pub mod vigil;

#[cfg(target_os = "none")]
pub mod boot;

// Re-export key types
pub use chime::{Chime, SleepRoster, Tick, TickDelta, FREQUENCY, NO_SLEEPERS};
pub use hearth::{HearthError, SparkId, SparkState};
pub use vigil::{IrqContext, IrqGuard};

/// Panic handler: every failure in this kernel is a precondition
/// violation, so we report it and stop the machine.
#[cfg(not(test))]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    crate::serial_println!("[PANIC] {}", info);
    loop {
        #[cfg(target_os = "none")]
        x86_64::instructions::hlt();
    }
}
