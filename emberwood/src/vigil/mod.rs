//! # The Vigil - Interrupt Layer
//!
//! The kernel's watchfulness over the outside world. The Vigil remaps the
//! PICs, scribes the IDT, and holds the primitives every other module uses
//! to step in and out of interrupt-masked critical sections.
//!
//! Only the timer line (IRQ 0) is left open; the chime is the one voice
//! this kernel listens to.

pub mod irq;
pub mod lock;

#[cfg(target_os = "none")]
pub mod idt;

pub use irq::{IrqContext, IrqGuard};
pub use lock::InterruptSafeLock;

use pic8259::ChainedPics;

/// The standard offset for remapping the PICs:
/// IRQs 0-15 become interrupts 32-47.
pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

/// The Programmable Interrupt Controllers.
/// Interrupt-safe because the timer handler locks them to send EOI.
pub static PICS: InterruptSafeLock<ChainedPics> = InterruptSafeLock::new(
    unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) },
    "PICS",
);

/// Raise the Vigil: remap the PICs, load the IDT, open only the timer line.
///
/// Must run before interrupts are enabled. Does not `sti` itself; the boot
/// sequence opens the gates once the clock source is programmed.
#[cfg(target_os = "none")]
pub fn init() {
    crate::println!("* Raising the Vigil...");

    unsafe {
        let mut pics = PICS.lock();
        pics.initialize();
        // Mask everything but IRQ 0; no other device has a handler yet.
        pics.write_masks(0xfe, 0xff);
    }

    idt::init();

    crate::println!("  + The Vigil stands; only the chime may speak.");
}
