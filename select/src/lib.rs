//! async-select - readiness multiplexing for suspended caller threads.
//!
//! A caller thread that wants to block until a descriptor is readable or
//! writable does not block in the OS call itself. Instead it registers a
//! request with the [`Selector`], suspends, and is resumed by a single
//! dedicated dispatch task that runs one multiplexed `poll(2)` over every
//! pending descriptor plus a wake descriptor. Timeouts are absolute
//! deadlines computed at submission and re-validated each pass.
//!
//! # Example
//!
//! ```ignore
//! use async_select::{Config, Operation, Selector};
//!
//! let selector = Selector::new(Config::default());
//!
//! // Caller thread: wait up to 500ms for the socket to become readable.
//! match selector.block_on(fd, Operation::Read, 500) {
//!     Ok(()) => { /* fd is readable, do the non-blocking read */ }
//!     Err(async_select::WaitError::TimedOut) => { /* report timeout */ }
//!     Err(e) => { /* report error */ }
//! }
//! ```
//!
//! Several threads may wait on the same descriptor; one readiness event can
//! wake more threads than there is data for. The retry protocol in
//! [`Selector::wait`] disambiguates "my timeout really passed" from "another
//! thread consumed my wakeup" by consulting the per-descriptor timeout
//! cache, and re-submits with the remaining time in the latter case.

mod cache;
mod config;
mod metrics;
mod notify;
mod request;
mod selector;

pub use cache::TimeoutCache;
pub use config::{Config, NotifyConfig};
pub use notify::NotifyMode;
pub use request::Operation;
pub use selector::{
    poll_ready, Selector, SubmitError, WaitError, WaitPhase, WaitVerdict,
};
