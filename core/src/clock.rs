//! Monotonic milliseconds and absolute-deadline arithmetic.
//!
//! Timeouts across the bridge are expressed as absolute deadlines computed
//! once at submission (`now + timeout`) and re-validated against current
//! time on every evaluation pass. This tolerates variable scheduling latency
//! of the dispatch tasks; a relative "time elapsed since the wait started"
//! would not. A deadline of 0 means "no deadline".

use std::sync::OnceLock;
use std::time::Instant;

/// Sentinel deadline meaning "wait forever".
pub const NO_DEADLINE: i64 = 0;

fn base() -> Instant {
    static BASE: OnceLock<Instant> = OnceLock::new();
    *BASE.get_or_init(Instant::now)
}

/// Milliseconds elapsed on the process-wide monotonic clock.
pub fn monotonic_ms() -> i64 {
    base().elapsed().as_millis() as i64
}

/// Absolute deadline for a relative timeout in milliseconds.
///
/// A `timeout_ms` of 0 (or less) maps to [`NO_DEADLINE`].
pub fn deadline_after(timeout_ms: i64) -> i64 {
    if timeout_ms <= 0 {
        NO_DEADLINE
    } else {
        monotonic_ms() + timeout_ms
    }
}

/// Milliseconds remaining until `deadline_ms`, saturated at 0.
///
/// A [`NO_DEADLINE`] deadline has no meaningful remainder; callers check
/// for it before asking.
pub fn remaining_ms(deadline_ms: i64) -> i64 {
    (deadline_ms - monotonic_ms()).max(0)
}

/// Whether `deadline_ms` has passed. [`NO_DEADLINE`] never expires.
pub fn expired(deadline_ms: i64) -> bool {
    deadline_ms != NO_DEADLINE && deadline_ms <= monotonic_ms()
}
