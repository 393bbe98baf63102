//! Selector metrics.

use metriken::{metric, Counter};

#[metric(
    name = "select_requests_submitted",
    description = "Total readiness requests submitted"
)]
pub static REQUESTS_SUBMITTED: Counter = Counter::new();

#[metric(
    name = "select_requests_rejected",
    description = "Submissions rejected because the request pool was full"
)]
pub static REQUESTS_REJECTED: Counter = Counter::new();

#[metric(name = "select_polls", description = "Multiplexed wait calls issued")]
pub static POLLS: Counter = Counter::new();

#[metric(name = "select_wakeups", description = "Wake descriptor firings")]
pub static WAKEUPS: Counter = Counter::new();

#[metric(
    name = "select_timeouts",
    description = "Waits that ended with a verified timeout"
)]
pub static TIMEOUTS: Counter = Counter::new();
