//! # The Hearth
//!
//! Keeper of the sparks - the ready queue and the sleeping set. The Hearth
//! does not weave contexts; it only tracks who may burn and who is banked
//! until a wake tick. The chime drives it from both sides: thread context
//! banks a spark, interrupt context stirs the due ones back.

pub mod scheduler;
pub mod spark;

pub use scheduler::{HearthError, Scheduler, SchedulerStats, MAX_SPARKS};
pub use spark::{Spark, SparkId, SparkState};

use crate::chime::{SleepRoster, Tick};
use crate::vigil::irq;
use crate::vigil::lock::InterruptSafeLock;

/// The one Hearth. Interrupt-safe: the timer handler walks the sleeping
/// set through this same lock.
static HEARTH: InterruptSafeLock<Scheduler> =
    InterruptSafeLock::new(Scheduler::new(), "HEARTH");

/// Kindle the Hearth and adopt the boot flow as the first spark, so that
/// `chime::sleep` has a current spark to bank from the very start.
pub fn init() {
    let mut hearth = HEARTH.lock();
    match hearth.spawn("ember") {
        Ok(id) => {
            // A fresh Hearth cannot lose its first spark.
            let _ = hearth.make_current(id);
        }
        Err(_) => panic!("hearth::init called twice?"),
    }
    drop(hearth);
    crate::println!("* The Hearth is kindled.");
}

/// The shared scheduler instance, for callers that need to drive several
/// operations under one critical section (the chime's interrupt path).
pub(crate) fn roster() -> &'static InterruptSafeLock<Scheduler> {
    &HEARTH
}

/// Kindle a new spark.
pub fn spawn(name: &'static str) -> Result<SparkId, HearthError> {
    HEARTH.lock().spawn(name)
}

/// The spark currently burning, if any.
pub fn current() -> Option<SparkId> {
    HEARTH.lock().current()
}

/// Bank the current spark under `wake_tick`.
///
/// Called by the chime from within an interrupt-masked section; sleeping
/// without a current spark is a precondition violation, not an error.
pub(crate) fn put_current_to_sleep(wake_tick: Tick) -> SparkId {
    let mut hearth = HEARTH.lock();
    let me = match hearth.current() {
        Some(id) => id,
        None => panic!("chime::sleep with no current spark"),
    };
    hearth.put_to_sleep(me, wake_tick);
    me
}

/// Park the CPU until the given spark is stirred back to ready, then make
/// it current again. The halt keeps the core idle between ticks instead
/// of burning it on a poll loop.
pub(crate) fn block_until_woken(me: SparkId) {
    loop {
        let ready = HEARTH.lock().is_ready(me);
        if ready {
            break;
        }
        #[cfg(not(test))]
        x86_64::instructions::hlt();
        #[cfg(test)]
        core::hint::spin_loop();
    }
    // Only the woken spark itself reaches here; reclaiming the CPU
    // cannot fail.
    let _ = HEARTH.lock().make_current(me);
}

/// Snapshot of the Hearth's statistics.
pub fn stats() -> SchedulerStats {
    irq::without(|| HEARTH.lock().stats())
}

/// Print the Hearth's statistics.
pub fn print_stats() {
    let stats = stats();
    crate::println!(
        "Hearth: {} sparks ({} blazing, {} glowing, {} banked), {} wakeups",
        stats.total_sparks,
        stats.blazing_sparks,
        stats.glowing_sparks,
        stats.banked_sparks,
        stats.wakeups
    );
}
