//! # Calibration - loops per tick
//!
//! Sub-tick delays cannot use the tick counter; they burn a calibrated
//! number of busy-loop iterations instead. Calibration finds the largest
//! iteration count that still finishes inside one tick, using a coarse
//! power-of-two search followed by a bit-by-bit refinement - O(log n)
//! probes, each costing about one tick.
//!
//! The search itself is a pure function over a `too_many` probe so it can
//! be exercised against a simulated tick source.

/// Starting candidate for the coarse search.
const SEED: u64 = 1 << 10;

/// Bits of precision: the high bit plus the nine refined below it.
const REFINE_BITS: u32 = 10;

/// Find the largest loop count for which `too_many` stays false, to
/// `REFINE_BITS` bits of precision.
///
/// Phase one doubles a candidate until one more doubling would cross a
/// tick boundary. Phase two walks the next nine bits below the surviving
/// high bit, keeping each one that still fits.
pub(crate) fn largest_loops_within_tick(mut too_many: impl FnMut(u64) -> bool) -> u64 {
    let mut loops = SEED;
    while !too_many(loops << 1) {
        loops <<= 1;
        assert!(loops != 0, "calibration overflowed the loop counter");
    }

    let high_bit = loops;
    let mut test_bit = high_bit >> 1;
    while test_bit != high_bit >> REFINE_BITS {
        if !too_many(loops | test_bit) {
            loops |= test_bit;
        }
        test_bit >>= 1;
    }

    loops
}

/// Burn `loops` iterations of a simple loop.
///
/// Marked `inline(never)`: code alignment measurably affects the timing of
/// this loop, and if it were inlined differently at each call site the
/// calibrated constant would not transfer between them. The `black_box`
/// keeps the otherwise side-effect-free loop from being optimized away.
#[inline(never)]
pub fn busy_wait(loops: i64) {
    let mut remaining = loops;
    while remaining > 0 {
        remaining -= 1;
        core::hint::black_box(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Probe for a simulated tick source where exactly `limit` iterations
    /// fit inside one tick.
    fn probe(limit: u64) -> impl FnMut(u64) -> bool {
        move |loops| loops > limit
    }

    #[test]
    fn converges_exactly_within_ten_bits() {
        // 5000 = 0b1_0011_1000_1000 is reachable with the high bit (4096)
        // plus bits no lower than high_bit >> 9.
        assert_eq!(largest_loops_within_tick(probe(5000)), 5000);
    }

    #[test]
    fn power_of_two_limit_is_exact() {
        assert_eq!(largest_loops_within_tick(probe(2048)), 2048);
        assert_eq!(largest_loops_within_tick(probe(1 << 20)), 1 << 20);
    }

    #[test]
    fn result_fits_and_doubling_does_not() {
        for limit in [3000u64, 77777, 123456, 999999] {
            let mut too_many = probe(limit);
            let loops = largest_loops_within_tick(probe(limit));
            assert!(!too_many(loops), "{loops} loops should fit in one tick");
            assert!(too_many(loops * 2), "{loops} * 2 should not fit");
            // Refinement stops at high_bit >> 9, bounding the undershoot.
            assert!(limit - loops <= limit / 512);
        }
    }

    #[test]
    fn busy_wait_handles_zero_and_negative() {
        busy_wait(0);
        busy_wait(-5);
        busy_wait(10_000);
    }
}
