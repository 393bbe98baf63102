//! Pump metrics.

use metriken::{metric, Counter};

#[metric(name = "pump_events_queued", description = "Events accepted into the queue")]
pub static EVENTS_QUEUED: Counter = Counter::new();

#[metric(
    name = "pump_events_dropped",
    description = "Events dropped because the queue was full"
)]
pub static EVENTS_DROPPED: Counter = Counter::new();

#[metric(
    name = "pump_events_discarded",
    description = "Delivered events discarded as oversized or empty"
)]
pub static EVENTS_DISCARDED: Counter = Counter::new();
