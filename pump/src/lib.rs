//! event-pump - bounded queue of variable-length event records.
//!
//! Producers run in callback contexts that cannot suspend: a push either
//! lands in the bounded queue or the event is dropped on the spot, counted
//! and logged. The consumer side is a single application thread that asks
//! for the next event and suspends when none is queued; the next successful
//! push resumes it.
//!
//! Exactly one concurrently waiting consumer is supported. A second
//! concurrent waiter is reported as an explicit error rather than being
//! silently mis-woken.
//!
//! # Example
//!
//! ```ignore
//! use event_pump::{Config, EventPump};
//! use bytes::Bytes;
//!
//! let pump = EventPump::new(Config::default());
//!
//! // stack callback context:
//! pump.push(Bytes::from_static(b"\x01\x02"));
//!
//! // consumer thread:
//! let mut buf = [0u8; 64];
//! let n = pump.wait_event(&mut buf, None)?;
//! handle(&buf[..n]);
//! ```

mod config;
mod metrics;
mod pump;

pub use config::Config;
pub use pump::{EventPump, PumpError, PushOutcome};
