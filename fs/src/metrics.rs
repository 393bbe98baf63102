//! FS dispatcher metrics.

use metriken::{metric, Counter};

#[metric(name = "fs_events_dispatched", description = "Events serviced by the dispatch task")]
pub static EVENTS_DISPATCHED: Counter = Counter::new();

#[metric(name = "fs_events_failed", description = "Events whose backend call failed")]
pub static EVENTS_FAILED: Counter = Counter::new();

#[metric(
    name = "fs_pool_exhausted",
    description = "Calls rejected because the event pool was full"
)]
pub static POOL_EXHAUSTED: Counter = Counter::new();
