//! The pump: bounded MPSC queue plus a single registered waiter.

use crate::config::Config;
use crate::metrics::{EVENTS_DISCARDED, EVENTS_DROPPED, EVENTS_QUEUED};
use bridge_core::suspend::{suspend_current, SuspendOutcome, ThreadHandle};
use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of a producer-side push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The event is in the queue (and any waiter has been resumed).
    Queued,
    /// The queue was full or the pump stopped; the event was discarded.
    Dropped,
}

/// Errors from the consumer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PumpError {
    /// The pump was stopped while waiting.
    #[error("pump is stopped")]
    Stopped,
    /// No event arrived within the requested timeout.
    #[error("no event within timeout")]
    TimedOut,
    /// Another thread is already registered as the waiter. Only one
    /// concurrently suspended consumer is supported.
    #[error("another thread is already waiting")]
    WaiterAlreadyRegistered,
}

/// Bounded event pump.
pub struct EventPump {
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
    waiter: Mutex<Option<ThreadHandle>>,
    stopped: AtomicBool,
    dropped: AtomicU64,
    discarded: AtomicU64,
}

impl EventPump {
    pub fn new(config: Config) -> EventPump {
        let (tx, rx) = crossbeam_channel::bounded(config.queue_size);
        EventPump {
            tx,
            rx,
            waiter: Mutex::new(None),
            stopped: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Producer side: enqueue an event record, never blocking.
    ///
    /// Callable from contexts that cannot suspend. On a full queue (or a
    /// stopped pump) the event is dropped immediately; there is no
    /// backpressure. A successful push resumes the registered waiter.
    pub fn push(&self, payload: Bytes) -> PushOutcome {
        if self.stopped.load(Ordering::Acquire) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            EVENTS_DROPPED.increment();
            return PushOutcome::Dropped;
        }
        match self.tx.try_send(payload) {
            Ok(()) => {
                EVENTS_QUEUED.increment();
                match &*self.waiter.lock() {
                    Some(waiter) => waiter.resume(),
                    None => debug!("event queued with no registered waiter"),
                }
                PushOutcome::Queued
            }
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                EVENTS_DROPPED.increment();
                warn!("event dropped, queue full");
                PushOutcome::Dropped
            }
            // the pump owns the receiver, so the channel cannot disconnect
            Err(TrySendError::Disconnected(_)) => PushOutcome::Dropped,
        }
    }

    /// Consumer side: copy the next event into `buf` and return its size.
    ///
    /// Records that do not fit in `buf`, and empty records, are discarded
    /// and the next record is examined. When the queue is empty the calling
    /// thread registers itself as THE waiter and suspends until the next
    /// push, the timeout, or [`EventPump::stop`].
    pub fn wait_event(
        &self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<usize, PumpError> {
        {
            let mut waiter = self.waiter.lock();
            let current = ThreadHandle::current();
            match &*waiter {
                Some(existing) if !existing.same_thread(&current) => {
                    return Err(PumpError::WaiterAlreadyRegistered);
                }
                _ => *waiter = Some(current),
            }
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            loop {
                match self.rx.try_recv() {
                    Ok(payload) => {
                        if payload.is_empty() {
                            self.discarded.fetch_add(1, Ordering::Relaxed);
                            EVENTS_DISCARDED.increment();
                            continue;
                        }
                        if payload.len() > buf.len() {
                            self.discarded.fetch_add(1, Ordering::Relaxed);
                            EVENTS_DISCARDED.increment();
                            warn!(
                                size = payload.len(),
                                capacity = buf.len(),
                                "event larger than caller buffer, discarded"
                            );
                            continue;
                        }
                        buf[..payload.len()].copy_from_slice(&payload);
                        return Ok(payload.len());
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return Err(PumpError::Stopped),
                }
            }

            if self.stopped.load(Ordering::Acquire) {
                return Err(PumpError::Stopped);
            }

            let remaining = match deadline {
                None => None,
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PumpError::TimedOut);
                    }
                    Some(deadline - now)
                }
            };
            if suspend_current(remaining) == SuspendOutcome::TimedOut {
                return Err(PumpError::TimedOut);
            }
        }
    }

    /// Stop the pump: resume any suspended waiter and drop everything
    /// still queued. Pushes after this point are dropped.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        if let Some(waiter) = self.waiter.lock().take() {
            waiter.resume();
        }
        while self.rx.try_recv().is_ok() {}
    }

    /// Events currently queued.
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    /// Events dropped on the producer side since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Events discarded on the consumer side (oversized or empty).
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}
