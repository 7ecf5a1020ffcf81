//! # The Chime - tick clock and sleep/wake scheduling
//!
//! The Chime is the kernel's sense of time. The 8254 rings it `TICK_HZ`
//! times per second; every ring advances a monotonic tick counter and, when
//! the next-wake threshold has come due, stirs the banked sparks whose time
//! has arrived.
//!
//! ## Philosophy
//! The common case must stay cheap: the interrupt handler pays one
//! comparison per tick, and the linear walk of the sleeping set runs only
//! on ticks where at least one spark actually wakes.
//!
//! ## Contract
//! `init` before interrupts are enabled, `calibrate` once with interrupts
//! enabled, and only then any sleep. Sleeping or calibrating with
//! interrupts disabled is a fatal assertion - there is no recovery from a
//! kernel that can never be woken.

pub mod calibrate;
pub mod pit;

use crate::hearth::{self, SparkId};
use crate::vigil::irq::{self, IrqContext, IrqGuard};
use crate::vigil::lock::InterruptSafeLock;

/// A point in time: the number of timer interrupts since boot.
pub type Tick = i64;

/// A span of time, in ticks.
pub type TickDelta = i64;

/// Sentinel threshold: no spark is sleeping.
pub const NO_SLEEPERS: Tick = Tick::MAX;

/// Ticks per second.
pub const FREQUENCY: Tick = pit::TICK_HZ as Tick;

/// The sleeping-set owner the Chime drives.
///
/// `put_to_sleep` must be safe from ordinary thread context (the Chime
/// calls it inside an interrupt-masked section). `wake_due` moves every
/// sleeper with `wake_tick <= now` back to ready and reports the new
/// earliest wake tick, or [`NO_SLEEPERS`]; the `IrqContext` token keeps it
/// callable only from the interrupt path.
pub trait SleepRoster {
    fn put_to_sleep(&mut self, spark: SparkId, wake_tick: Tick);
    fn wake_due(&mut self, irq: &IrqContext, now: Tick) -> Tick;
}

/// The timing subsystem: tick counter, next-wake threshold, and the
/// calibrated loops-per-tick constant, initialized once at boot and never
/// torn down.
pub struct Chime {
    /// Ticks since boot. Mutated only from interrupt context; read
    /// everywhere else through an interrupt-masked snapshot.
    ticks: Tick,
    /// Minimum wake tick over all banked sparks, or [`NO_SLEEPERS`].
    /// Restored before the interrupt handler returns and before any
    /// sleep request returns to its caller.
    next_wake: Tick,
    /// Busy-loop iterations that fit in strictly less than one tick.
    /// Written once by calibration, immutable after.
    loops_per_tick: u64,
}

impl Chime {
    pub const fn new() -> Self {
        Self {
            ticks: 0,
            next_wake: NO_SLEEPERS,
            loops_per_tick: 0,
        }
    }

    /// Current tick count.
    pub fn ticks(&self) -> Tick {
        self.ticks
    }

    /// Ticks elapsed since `then`, which must be a value previously read
    /// from this chime. A value from the future yields a negative delta;
    /// no validation is performed.
    pub fn elapsed(&self, then: Tick) -> TickDelta {
        self.ticks - then
    }

    /// Current next-wake threshold.
    pub fn next_wake(&self) -> Tick {
        self.next_wake
    }

    pub fn loops_per_tick(&self) -> u64 {
        self.loops_per_tick
    }

    /// Wake tick for a sleep of `dur` ticks requested at `start`, or
    /// `None` if the request has already elapsed and needs no blocking.
    pub fn plan_wake(&self, start: Tick, dur: TickDelta) -> Option<Tick> {
        if self.elapsed(start) >= dur {
            return None;
        }
        // Alarm arithmetic: now + requested - already served.
        Some(self.ticks + dur - self.elapsed(start))
    }

    /// Fold a new sleeper's wake tick into the threshold.
    pub fn note_sleeper(&mut self, wake_tick: Tick) {
        if wake_tick < self.next_wake {
            self.next_wake = wake_tick;
        }
    }

    /// One ring of the chime. Interrupt context only.
    ///
    /// Advances the counter, and only when the threshold has come due
    /// asks the roster to stir the due sparks, adopting the returned
    /// minimum as the new threshold.
    pub fn on_tick(&mut self, irq: &IrqContext, roster: &mut impl SleepRoster) {
        self.ticks += 1;
        if self.next_wake <= self.ticks {
            self.next_wake = roster.wake_due(irq, self.ticks);
        }
    }
}

impl Default for Chime {
    fn default() -> Self {
        Self::new()
    }
}

/// The one Chime. Interrupt-safe: the timer handler and every sleeper
/// share it.
static CHIME: InterruptSafeLock<Chime> = InterruptSafeLock::new(Chime::new(), "CHIME");

/// Program the 8254 to ring `FREQUENCY` times per second.
///
/// Call exactly once, before interrupts are enabled; the handler itself
/// is scribed into the IDT by the Vigil.
#[cfg(target_os = "none")]
pub fn init() {
    unsafe {
        pit::program(pit::TICK_HZ);
    }
    crate::println!("* The Chime is set to ring {} times per second.", FREQUENCY);
}

/// Calibrate `loops_per_tick`, used to implement brief sub-tick delays.
///
/// Must run exactly once, with interrupts enabled, before any sub-tick
/// sleep. Costs one tick per probe, O(log n) probes total.
pub fn calibrate() {
    assert!(
        irq::are_enabled(),
        "chime::calibrate: interrupts must be enabled"
    );
    crate::println!("Calibrating the chime...");

    let loops = calibrate::largest_loops_within_tick(too_many_loops);
    CHIME.lock().loops_per_tick = loops;

    crate::println!("  {} loops/s.", loops as i64 * FREQUENCY);
}

/// Probe: do `loops` iterations run past a tick boundary?
///
/// Waits for a fresh boundary first so every probe measures a full tick.
fn too_many_loops(loops: u64) -> bool {
    let start = ticks();
    while ticks() == start {
        core::hint::spin_loop();
    }

    let start = ticks();
    calibrate::busy_wait(loops as i64);

    ticks() != start
}

/// Consistent snapshot of the tick counter.
///
/// Taken with interrupts disabled for the read and the prior level
/// restored after, so a multi-word counter can never tear against the
/// interrupt handler.
pub fn ticks() -> Tick {
    CHIME.lock().ticks()
}

/// Ticks elapsed since `then`, a value once returned by [`ticks`].
pub fn elapsed(then: Tick) -> TickDelta {
    CHIME.lock().elapsed(then)
}

/// Suspend the calling spark for approximately `dur` ticks.
///
/// The spark wakes on the first tick at or after `start + dur` - never
/// early, and late only by interrupt dispatch latency. Requests that have
/// already elapsed return at once. Sleeping is a voluntary yield;
/// requesting it with interrupts disabled is fatal.
pub fn sleep(dur: TickDelta) {
    let start = ticks();

    assert!(
        irq::are_enabled(),
        "chime::sleep: caller must have interrupts enabled"
    );

    // One masked section covers the roster insert and the threshold
    // update, so the handler never sees one without the other.
    let masked = IrqGuard::new();
    let wake = match CHIME.lock().plan_wake(start, dur) {
        None => return,
        Some(wake) => wake,
    };
    let me: SparkId = hearth::put_current_to_sleep(wake);
    CHIME.lock().note_sleeper(wake);
    drop(masked);

    hearth::block_until_woken(me);
}

/// Suspend execution for approximately `ms` milliseconds.
pub fn sleep_ms(ms: i64) {
    real_time_sleep(ms, 1000);
}

/// Suspend execution for approximately `us` microseconds.
pub fn sleep_us(us: i64) {
    real_time_sleep(us, 1_000_000);
}

/// Suspend execution for approximately `ns` nanoseconds.
pub fn sleep_ns(ns: i64) {
    real_time_sleep(ns, 1_000_000_000);
}

/// Print timer statistics.
pub fn print_stats() {
    crate::println!("Chime: {} ticks", ticks());
}

/// One ring of the chime, called from the timer interrupt handler.
pub fn on_tick(irq: &IrqContext) {
    let mut chime = CHIME.lock();
    let mut roster = hearth::roster().lock();
    chime.on_tick(irq, &mut *roster);
}

/// Ticks in `num / denom` seconds, rounding toward zero.
fn ticks_for(num: i64, denom: i64) -> TickDelta {
    // (num / denom) s / (1 s / FREQUENCY ticks) = num * FREQUENCY / denom.
    num * FREQUENCY / denom
}

/// Busy-loop iterations for a sub-tick `num / denom` second delay.
///
/// The divisions are interleaved in exactly this order to keep every
/// intermediate product inside i64; requires `denom` to be a multiple of
/// 1000, which holds for all three supported units.
fn subtick_loops(loops_per_tick: u64, num: i64, denom: i64) -> i64 {
    loops_per_tick as i64 * num / 1000 * FREQUENCY / (denom / 1000)
}

/// Sleep for approximately `num / denom` seconds.
fn real_time_sleep(num: i64, denom: i64) {
    let dur = ticks_for(num, denom);

    assert!(
        irq::are_enabled(),
        "chime::real_time_sleep: interrupts must be enabled"
    );

    if dur > 0 {
        // At least one full tick: yield the CPU to the other sparks.
        sleep(dur);
    } else {
        // Shorter than a tick: burn calibrated loops for accuracy.
        assert!(
            denom % 1000 == 0,
            "sub-tick sleep requires a denominator in thousandths"
        );
        let loops_per_tick = CHIME.lock().loops_per_tick();
        calibrate::busy_wait(subtick_loops(loops_per_tick, num, denom));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hearth::{Scheduler, SparkState};

    fn irq() -> IrqContext {
        // Tests stand in for the interrupt handler.
        unsafe { IrqContext::new() }
    }

    /// Advance the chime `n` ticks against the given roster.
    fn ring(chime: &mut Chime, roster: &mut Scheduler, n: u64) {
        let token = irq();
        for _ in 0..n {
            chime.on_tick(&token, roster);
        }
    }

    #[test]
    fn elapsed_of_a_fresh_read_is_zero() {
        let mut chime = Chime::new();
        let mut roster = Scheduler::new();
        ring(&mut chime, &mut roster, 17);
        assert_eq!(chime.elapsed(chime.ticks()), 0);
    }

    #[test]
    fn ticks_never_decrease() {
        let mut chime = Chime::new();
        let mut roster = Scheduler::new();
        let mut last = chime.ticks();
        for _ in 0..100 {
            ring(&mut chime, &mut roster, 1);
            let now = chime.ticks();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn fresh_chime_has_no_threshold() {
        assert_eq!(Chime::new().next_wake(), NO_SLEEPERS);
    }

    #[test]
    fn plan_wake_is_alarm_arithmetic() {
        let mut chime = Chime::new();
        let mut roster = Scheduler::new();
        ring(&mut chime, &mut roster, 50);

        // Requested at tick 50 for 10 ticks: wake at 60.
        assert_eq!(chime.plan_wake(50, 10), Some(60));
        // A request that already elapsed needs no blocking.
        assert_eq!(chime.plan_wake(40, 10), None);
        assert_eq!(chime.plan_wake(30, 5), None);
    }

    #[test]
    fn note_sleeper_keeps_the_minimum() {
        let mut chime = Chime::new();
        chime.note_sleeper(90);
        assert_eq!(chime.next_wake(), 90);
        chime.note_sleeper(60);
        assert_eq!(chime.next_wake(), 60);
        chime.note_sleeper(75);
        assert_eq!(chime.next_wake(), 60);
    }

    #[test]
    fn sleeping_spark_wakes_on_time_and_never_early() {
        let mut chime = Chime::new();
        let mut roster = Scheduler::new();
        let spark = roster.spawn("dozer").unwrap();

        // Tick 50: sleep(10) -> banked until 60.
        ring(&mut chime, &mut roster, 50);
        let wake = chime.plan_wake(50, 10).unwrap();
        assert_eq!(wake, 60);
        roster.put_to_sleep(spark, wake);
        chime.note_sleeper(wake);
        assert_eq!(chime.next_wake(), 60);

        // Every tick through 59: still banked, threshold untouched.
        for _ in 51..=59 {
            ring(&mut chime, &mut roster, 1);
            assert_eq!(roster.state_of(spark), Some(SparkState::Banked(60)));
            assert_eq!(chime.next_wake(), 60);
        }

        // Tick 60: stirred back to ready, threshold back to sentinel.
        ring(&mut chime, &mut roster, 1);
        assert_eq!(chime.ticks(), 60);
        assert_eq!(roster.state_of(spark), Some(SparkState::Glowing));
        assert!(roster.is_ready(spark));
        assert_eq!(chime.next_wake(), NO_SLEEPERS);
    }

    #[test]
    fn threshold_tracks_minimum_across_staggered_sleepers() {
        let mut chime = Chime::new();
        let mut roster = Scheduler::new();
        let a = roster.spawn("a").unwrap();
        let b = roster.spawn("b").unwrap();
        let c = roster.spawn("c").unwrap();

        ring(&mut chime, &mut roster, 10);
        for (spark, wake) in [(a, 20), (b, 15), (c, 30)] {
            roster.put_to_sleep(spark, wake);
            chime.note_sleeper(wake);
            assert_eq!(chime.next_wake(), roster.min_wake_tick());
        }
        assert_eq!(chime.next_wake(), 15);

        // Tick 15 wakes b; threshold falls through to a's 20.
        ring(&mut chime, &mut roster, 5);
        assert!(roster.is_ready(b));
        assert_eq!(chime.next_wake(), 20);
        assert_eq!(chime.next_wake(), roster.min_wake_tick());

        // Tick 20 wakes a, tick 30 wakes c and drains the set.
        ring(&mut chime, &mut roster, 5);
        assert_eq!(chime.next_wake(), 30);
        ring(&mut chime, &mut roster, 10);
        assert_eq!(chime.next_wake(), NO_SLEEPERS);
        assert_eq!(roster.sleeping_count(), 0);
    }

    #[test]
    fn handler_skips_the_scan_until_due() {
        struct CountingRoster {
            scans: usize,
        }
        impl SleepRoster for CountingRoster {
            fn put_to_sleep(&mut self, _spark: SparkId, _wake_tick: Tick) {}
            fn wake_due(&mut self, _irq: &IrqContext, _now: Tick) -> Tick {
                self.scans += 1;
                NO_SLEEPERS
            }
        }

        let mut chime = Chime::new();
        let mut roster = CountingRoster { scans: 0 };
        chime.note_sleeper(40);

        let token = irq();
        for _ in 0..39 {
            chime.on_tick(&token, &mut roster);
        }
        // Threshold not yet due: one comparison per tick, no scans.
        assert_eq!(roster.scans, 0);

        chime.on_tick(&token, &mut roster);
        assert_eq!(roster.scans, 1);

        // Sentinel threshold: the scan never runs again.
        chime.on_tick(&token, &mut roster);
        assert_eq!(roster.scans, 1);
    }

    #[test]
    fn tick_conversion_rounds_toward_zero() {
        // 100 Hz: 10ms per tick.
        assert_eq!(ticks_for(10, 1000), 1);
        assert_eq!(ticks_for(25, 1000), 2);
        assert_eq!(ticks_for(9, 1000), 0);
        assert_eq!(ticks_for(0, 1000), 0);
        assert_eq!(ticks_for(999, 1_000_000), 0);
        assert_eq!(ticks_for(1, 1), FREQUENCY);
    }

    #[test]
    fn subtick_scaling_matches_the_calibrated_constant() {
        // 5000 loops/tick at 100 Hz: a tick is 10ms.
        // 250us is 1/40 of a tick -> 125 loops.
        assert_eq!(subtick_loops(5000, 250, 1_000_000), 125);
        // 5ms is half a tick -> 2500 loops.
        assert_eq!(subtick_loops(5000, 5, 1000), 2500);
        // A zero-length request burns nothing.
        assert_eq!(subtick_loops(5000, 0, 1000), 0);
    }

    #[test]
    fn subtick_division_order_avoids_overflow() {
        // The naive loops * num * FREQUENCY product would exceed i64;
        // the interleaved divisions keep every intermediate in range.
        let loops = subtick_loops(5_000_000_000, 999_999_999, 1_000_000_000);
        assert_eq!(loops, 499_999_999_500);
    }

    #[test]
    fn sleep_ms_zero_takes_the_busy_path_and_skips_the_roster() {
        // With 5000 loops/tick at 100 Hz, sleep_ms(0) computes zero
        // ticks, so it must busy-wait rather than bank a spark.
        assert_eq!(ticks_for(0, 1000), 0);
        assert_eq!(subtick_loops(5000, 0, 1000), 0);

        // The equivalent flow against a real roster: nothing is banked
        // and the threshold stays at the sentinel.
        let mut chime = Chime::new();
        let roster = Scheduler::new();
        assert_eq!(chime.plan_wake(chime.ticks(), ticks_for(0, 1000)), None);
        chime.loops_per_tick = 5000;
        calibrate::busy_wait(subtick_loops(chime.loops_per_tick(), 0, 1000));
        assert_eq!(roster.sleeping_count(), 0);
        assert_eq!(chime.next_wake(), NO_SLEEPERS);
    }
}
