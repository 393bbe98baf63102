//! bridge-core - shared building blocks for the cross-thread I/O bridge.
//!
//! The bridge pattern lets an application thread issue a blocking-looking
//! call, suspend itself, have a dedicated worker thread perform the real
//! blocking OS call, and get resumed when the result is ready. This crate
//! provides the pieces every subsystem shares:
//!
//! - [`pool`] - fixed-capacity slot arena with generation-checked handles
//! - [`suspend`] - the thread suspend/resume permit primitive
//! - [`clock`] - monotonic milliseconds and absolute-deadline arithmetic
//! - [`logging`] - tracing subscriber initialization

pub mod clock;
pub mod logging;
pub mod pool;
pub mod suspend;

pub use pool::{Pool, PoolError, SlotId};
pub use suspend::{suspend_current, SuspendOutcome, ThreadHandle};
