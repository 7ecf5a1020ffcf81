//! Boot entry - the first breath of Emberwood
//!
//! The loader drops us here with interrupts disabled and a flat mapping.
//! Ordering is the whole contract: the Vigil before the clock source, the
//! clock source before the gates open, the gates open before calibration,
//! calibration before any sub-tick sleep.

use crate::{chime, drivers, hearth, vigil};

#[no_mangle]
pub extern "C" fn _start() -> ! {
    drivers::serial::init();
    crate::serial_println!("[BOOT] emberwood rising");

    crate::println!("EmberOS - the Chime, the Hearth, and the Vigil");

    // PIC remap + IDT, still with interrupts off.
    vigil::init();

    // Program the 8254 before opening the gates, so the first interrupt
    // that arrives is a tick we asked for.
    chime::init();

    // Adopt the boot flow as the first spark.
    hearth::init();

    // Open the gates: from here on the chime rings.
    vigil::irq::enable();

    // One-time calibration; needs the chime ringing.
    chime::calibrate();

    // Prove the wakeup path end to end.
    let start = chime::ticks();
    chime::sleep(10);
    crate::println!(
        "slept 10 ticks, woke after {} (never fewer)",
        chime::elapsed(start)
    );

    chime::sleep_ms(25); // tick-granular: 25ms is 2+ ticks at 100 Hz
    chime::sleep_ms(5); // sub-tick: busy-waits on the calibrated loop
    chime::sleep_us(250);
    chime::sleep_ns(100_000);

    chime::print_stats();
    hearth::print_stats();

    crate::serial_println!("[BOOT] emberwood at rest");
    loop {
        x86_64::instructions::hlt();
    }
}
