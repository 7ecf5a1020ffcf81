//! Interrupt-flag primitives
//!
//! The only synchronization discipline the timing core uses is "disable
//! interrupts, do the critical work, restore the prior level". These
//! primitives wrap the CPU's interrupt flag; on the host (tests) they act
//! on a simulated per-thread flag instead so the logic stays observable.

use core::marker::PhantomData;

#[cfg(not(test))]
mod flag {
    use x86_64::instructions::interrupts;

    pub fn are_enabled() -> bool {
        interrupts::are_enabled()
    }

    pub fn disable() {
        interrupts::disable();
    }

    pub fn enable() {
        interrupts::enable();
    }
}


/// Check whether interrupts are currently enabled.
pub fn are_enabled() -> bool {
    flag::are_enabled()
}

/// Disable interrupts (`cli`).
pub fn disable() {
    flag::disable();
}

/// Enable interrupts (`sti`).
pub fn enable() {
    flag::enable();
}

/// A scoped critical section: disables interrupts on construction and
/// restores the *prior* level on every exit path, including early returns
/// and panics that unwind through it.
///
/// Prefer this over manual `disable()`/`enable()` pairs; a forgotten
/// re-enable on an early return is exactly the kind of bug that wedges
/// the whole machine.
pub struct IrqGuard {
    was_enabled: bool,
}

impl IrqGuard {
    pub fn new() -> Self {
        let was_enabled = are_enabled();
        disable();
        IrqGuard { was_enabled }
    }
}

impl Default for IrqGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        if self.was_enabled {
            enable();
        }
    }
}

/// Run a closure with interrupts disabled, restoring the prior level after.
pub fn without<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = IrqGuard::new();
    f()
}

/// Capability token proving the holder is running in interrupt context.
///
/// Minted only inside the timer interrupt handler (via the `unsafe`
/// constructor); operations that must never run from thread context, like
/// the wake scan, demand a reference to it. `!Send` so it cannot leak out
/// of the handler into a thread.
pub struct IrqContext {
    _not_send: PhantomData<*mut ()>,
}

impl IrqContext {
    /// # Safety
    ///
    /// Must only be called from within an interrupt handler, where
    /// interrupts are implicitly masked for the duration of the call.
    pub unsafe fn new() -> Self {
        IrqContext {
            _not_send: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_enabled_level() {
        enable();
        {
            let _g = IrqGuard::new();
            assert!(!are_enabled());
        }
        assert!(are_enabled());
    }

    #[test]
    fn guard_preserves_disabled_level() {
        disable();
        {
            let _g = IrqGuard::new();
            assert!(!are_enabled());
        }
        assert!(!are_enabled());
        enable();
    }

    #[test]
    fn nested_guards_restore_in_order() {
        enable();
        {
            let _outer = IrqGuard::new();
            {
                let _inner = IrqGuard::new();
                assert!(!are_enabled());
            }
            // Inner guard restores to "disabled" (the outer's level).
            assert!(!are_enabled());
        }
        assert!(are_enabled());
    }

    #[test]
    fn without_returns_value_and_restores() {
        enable();
        let v = without(|| {
            assert!(!are_enabled());
            7
        });
        assert_eq!(v, 7);
        assert!(are_enabled());
    }
}
