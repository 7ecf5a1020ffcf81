//! # The Laws of Reaction - Interrupt Descriptor Table
//!
//! One law is scribed here: the timer spell on vector 32. The handler does
//! as little as possible in interrupt context - advance the chime, let it
//! stir any sparks whose wake tick has come, acknowledge the PIC.

use lazy_static::lazy_static;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame};

use super::irq::IrqContext;

/// IRQ 0 after the PIC remap.
pub const TIMER_VECTOR: u8 = super::PIC_1_OFFSET;

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        idt[TIMER_VECTOR as usize].set_handler_fn(timer_interrupt_handler);
        idt
    };
}

/// Load the IDT into the CPU.
pub fn init() {
    IDT.load();
}

/// The Timer Spell - fires once per tick.
///
/// Interrupts are implicitly masked for the whole handler on this platform
/// family, so the tick bookkeeping runs atomically with respect to every
/// thread-context caller.
extern "x86-interrupt" fn timer_interrupt_handler(_stack_frame: InterruptStackFrame) {
    // We are the interrupt context; mint the token that proves it.
    let irq = unsafe { IrqContext::new() };

    crate::chime::on_tick(&irq);

    // Without the EOI, the chime falls silent forever.
    unsafe {
        super::PICS.lock().notify_end_of_interrupt(TIMER_VECTOR);
    }
}
