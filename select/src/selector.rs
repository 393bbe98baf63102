//! The selector: producer API plus the single dispatch task.
//!
//! Producers register a readiness request, suspend, and get resumed by the
//! dispatch task when their descriptor is ready or their deadline passes.
//! The dispatch task rebuilds the poll set from the pending-request list on
//! every iteration, so a request submitted against an already-ready
//! descriptor is noticed on the very next pass; there is no registration
//! state to race against.

use crate::cache::TimeoutCache;
use crate::config::Config;
use crate::metrics::{POLLS, REQUESTS_REJECTED, REQUESTS_SUBMITTED, TIMEOUTS, WAKEUPS};
use crate::notify::{Notifier, NotifyMode};
use crate::request::{Operation, Request, RequestList};
use bridge_core::suspend::{suspend_current, ThreadHandle};
use bridge_core::clock;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Errors from [`Selector::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// The request pool is full. Recoverable: retry later.
    #[error("blocking request queue limit reached")]
    QueueLimitReached,
    /// The selector has been shut down.
    #[error("selector is shut down")]
    Shutdown,
}

/// Errors from [`Selector::block_on`].
#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    /// The deadline passed without the descriptor becoming ready.
    #[error("operation timed out")]
    TimedOut,
    /// The request pool is full. Recoverable: retry later.
    #[error("blocking request queue limit reached")]
    QueueLimitReached,
    /// The selector has been shut down.
    #[error("selector is shut down")]
    Shutdown,
    /// Negative timeout.
    #[error("invalid timeout")]
    InvalidTimeout,
    /// Readiness probe failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Whether a [`Selector::wait`] call is the first attempt or a re-entry
/// after the caller was woken.
///
/// The explicit two-state form of what callers must tell the selector: a
/// `Retry` with no data available is *not* proof of a timeout, because
/// another thread sharing the descriptor may have consumed the wakeup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// First attempt for this logical operation.
    Initial,
    /// Re-entry after a wakeup that found no data.
    Retry,
}

/// Outcome of [`Selector::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitVerdict {
    /// Request accepted; the caller should suspend and re-enter with
    /// [`WaitPhase::Retry`] once resumed. This is the busy-signal, not an
    /// error.
    Pending,
    /// The recorded deadline has verifiably passed.
    TimedOut,
    /// The request pool is full. Recoverable: retry later.
    QueueLimitReached,
    /// The selector has been shut down.
    Shutdown,
}

struct Pending {
    list: RequestList,
    /// Cleared by the dispatch task under this lock during its final sweep,
    /// so no request can be linked after the sweep and strand its producer.
    accepting: bool,
}

struct Shared {
    requests: Mutex<Pending>,
    cache: TimeoutCache,
    notifier: Notifier,
    shutdown: AtomicBool,
    polling_fallback_ms: i32,
}

/// Readiness multiplexer with a single dispatch task.
pub struct Selector {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Selector {
    /// Create a selector and start its dispatch task.
    pub fn new(config: Config) -> Selector {
        let shared = Arc::new(Shared {
            requests: Mutex::new(Pending {
                list: RequestList::with_capacity(config.max_requests),
                accepting: true,
            }),
            cache: TimeoutCache::new(config.timeout_cache_size),
            notifier: Notifier::new(config.notify),
            shutdown: AtomicBool::new(false),
            polling_fallback_ms: config.polling_fallback_ms.max(1),
        });
        let task_shared = shared.clone();
        let task = std::thread::Builder::new()
            .name("async-select".to_string())
            .spawn(move || run(task_shared))
            .expect("failed to spawn async-select dispatch task");
        Selector {
            shared,
            task: Mutex::new(Some(task)),
        }
    }

    /// Register a readiness request for the calling thread.
    ///
    /// Records the absolute deadline (`now + timeout_ms`, 0 meaning
    /// unbounded) in the timeout cache, links the request into the pending
    /// list, and wakes the dispatch task. Does not suspend; the caller
    /// suspends itself afterwards and is resumed when the condition or the
    /// deadline fires.
    pub fn submit(&self, fd: RawFd, op: Operation, timeout_ms: i64) -> Result<(), SubmitError> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(SubmitError::Shutdown);
        }
        let deadline_ms = clock::deadline_after(timeout_ms);
        {
            let mut pending = self.shared.requests.lock();
            if !pending.accepting {
                return Err(SubmitError::Shutdown);
            }
            let submitted = pending.list.submit(Request {
                fd,
                op,
                deadline_ms,
                owner: Some(ThreadHandle::current()),
            });
            if submitted.is_none() {
                REQUESTS_REJECTED.increment();
                return Err(SubmitError::QueueLimitReached);
            }
        }
        // recorded before the caller suspends, so a retry can tell a real
        // timeout from a stolen wakeup
        self.shared.cache.set_deadline(fd, deadline_ms);
        REQUESTS_SUBMITTED.increment();
        trace!(fd, ?op, deadline_ms, "readiness request submitted");
        self.shared.notifier.wake();
        Ok(())
    }

    /// Submit-or-verify step of the retry protocol.
    ///
    /// On [`WaitPhase::Initial`] this submits a wait using the timeout
    /// recorded for the descriptor. On [`WaitPhase::Retry`] with a
    /// configured timeout it first checks the recorded absolute deadline:
    /// only a deadline that has really passed yields
    /// [`WaitVerdict::TimedOut`]; otherwise the wakeup was consumed by
    /// another thread sharing the descriptor and a fresh wait is submitted
    /// for the remaining time.
    pub fn wait(&self, fd: RawFd, op: Operation, phase: WaitPhase) -> WaitVerdict {
        let mut timeout_ms = self.shared.cache.timeout(fd).unwrap_or(0);
        if timeout_ms != 0 && phase == WaitPhase::Retry {
            match self.shared.cache.deadline(fd) {
                Some(deadline_ms) => {
                    let now = clock::monotonic_ms();
                    if now >= deadline_ms {
                        TIMEOUTS.increment();
                        return WaitVerdict::TimedOut;
                    }
                    timeout_ms = deadline_ms - now;
                }
                None => {
                    TIMEOUTS.increment();
                    return WaitVerdict::TimedOut;
                }
            }
        }
        match self.submit(fd, op, timeout_ms) {
            Ok(()) => WaitVerdict::Pending,
            Err(SubmitError::QueueLimitReached) => WaitVerdict::QueueLimitReached,
            Err(SubmitError::Shutdown) => WaitVerdict::Shutdown,
        }
    }

    /// Block the calling thread until `fd` satisfies `op` or `timeout_ms`
    /// elapses (0 = wait forever).
    ///
    /// `Ok(())` means the descriptor is ready now; `TimedOut` means the
    /// deadline verifiably passed without readiness. A wakeup stolen by
    /// another thread sharing the descriptor leads to a silent re-submission
    /// for the remaining time.
    pub fn block_on(&self, fd: RawFd, op: Operation, timeout_ms: i64) -> Result<(), WaitError> {
        if timeout_ms < 0 {
            return Err(WaitError::InvalidTimeout);
        }
        self.shared.cache.set_timeout(fd, timeout_ms);
        let mut phase = WaitPhase::Initial;
        loop {
            if poll_ready(fd, op)? {
                return Ok(());
            }
            match self.wait(fd, op, phase) {
                WaitVerdict::Pending => {
                    suspend_current(None);
                    phase = WaitPhase::Retry;
                }
                WaitVerdict::TimedOut => return Err(WaitError::TimedOut),
                WaitVerdict::QueueLimitReached => return Err(WaitError::QueueLimitReached),
                WaitVerdict::Shutdown => return Err(WaitError::Shutdown),
            }
        }
    }

    /// Tell the selector that `fd` was closed out-of-band.
    ///
    /// On some stacks closing a descriptor does not unblock a concurrent
    /// multiplexed wait, so every pending request on `fd` has its deadline
    /// forced into the past and the dispatch task is woken to notice. Also
    /// evicts the descriptor's timeout-cache entry.
    pub fn notify_closed(&self, fd: RawFd) {
        {
            let mut pending = self.shared.requests.lock();
            pending.list.expire_fd(fd);
        }
        self.shared.cache.remove(fd);
        self.shared.notifier.wake();
    }

    /// Number of requests currently pending.
    pub fn pending(&self) -> usize {
        self.shared.requests.lock().list.used_count()
    }

    /// Effective wake mode.
    pub fn notify_mode(&self) -> NotifyMode {
        self.shared.notifier.mode()
    }

    /// The per-descriptor timeout cache.
    pub fn timeout_cache(&self) -> &TimeoutCache {
        &self.shared.cache
    }

    /// Stop the dispatch task.
    ///
    /// Every pending request is expired and its owner resumed, so no
    /// producer stays suspended. Subsequent submissions fail with
    /// [`SubmitError::Shutdown`].
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.notifier.wake();
        if let Some(task) = self.task.lock().take() {
            if task.join().is_err() {
                warn!("async-select dispatch task panicked");
            }
        }
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Zero-timeout readiness probe for a single descriptor.
///
/// Error and hang-up conditions count as ready: an operation attempted on
/// such a descriptor will not block, which is all the callers need to know.
pub fn poll_ready(fd: RawFd, op: Operation) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: op.poll_events(),
        revents: 0,
    };
    let res = unsafe { libc::poll(&mut pfd, 1, 0) };
    if res < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    let ready_mask = op.poll_events() | libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;
    Ok(res > 0 && (pfd.revents & ready_mask) != 0)
}

fn run(shared: Arc<Shared>) {
    debug!("dispatch task running");
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }

        let notify_fd = shared.notifier.poll_fd();

        // snapshot the pending list into a poll set; requests submitted
        // after this point are still covered, either by the wake descriptor
        // or by the bounded fallback timeout
        let mut pollfds: Vec<libc::pollfd> = Vec::new();
        let mut indices: Vec<usize> = Vec::new();
        let mut min_deadline_ms = i64::MAX;
        {
            let pending = shared.requests.lock();
            for (idx, req) in pending.list.iter_used() {
                pollfds.push(libc::pollfd {
                    fd: req.fd,
                    events: req.op.poll_events(),
                    revents: 0,
                });
                indices.push(idx);
                if req.deadline_ms != clock::NO_DEADLINE && req.deadline_ms < min_deadline_ms {
                    min_deadline_ms = req.deadline_ms;
                }
            }
        }
        let notify_slot = notify_fd.map(|fd| {
            pollfds.push(libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            });
            pollfds.len() - 1
        });

        let timeout: libc::c_int = if min_deadline_ms != i64::MAX {
            clock::remaining_ms(min_deadline_ms).min(i32::MAX as i64) as libc::c_int
        } else if notify_fd.is_some() {
            -1
        } else {
            // no wake descriptor available: bound the wait so new requests
            // are noticed within the fallback interval
            trace!("no wake descriptor, polling fallback");
            shared.polling_fallback_ms
        };

        POLLS.increment();
        let res = unsafe { libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, timeout) };
        if res < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            warn!("poll failed: {err}");
            std::thread::sleep(Duration::from_millis(shared.polling_fallback_ms as u64));
            continue;
        }

        if let Some(slot) = notify_slot {
            if pollfds[slot].revents != 0 {
                WAKEUPS.increment();
                shared.notifier.drain();
            }
        }

        let mut revents_by_idx: HashMap<usize, i16> = HashMap::with_capacity(indices.len());
        for (pos, idx) in indices.iter().enumerate() {
            revents_by_idx.insert(*idx, pollfds[pos].revents);
        }

        // a request is done when its readiness bit fired or its deadline
        // passed; POLLNVAL/POLLERR/POLLHUP also complete it, since an
        // operation on such a descriptor would not block
        let now = clock::monotonic_ms();
        let owners = {
            let mut pending = shared.requests.lock();
            pending.list.complete_where(|idx, req| {
                let revents = revents_by_idx.get(&idx).copied().unwrap_or(0);
                let ready_mask =
                    req.op.poll_events() | libc::POLLERR | libc::POLLHUP | libc::POLLNVAL;
                (revents & ready_mask) != 0
                    || (req.deadline_ms != clock::NO_DEADLINE && req.deadline_ms <= now)
            })
        };
        for owner in &owners {
            owner.resume();
        }
        if !owners.is_empty() {
            trace!(resumed = owners.len(), "requests completed");
        }
    }

    // final sweep: stop accepting and resume anything still pending so no
    // producer stays suspended
    let owners = {
        let mut pending = shared.requests.lock();
        pending.accepting = false;
        pending.list.complete_all()
    };
    for owner in owners {
        owner.resume();
    }
    debug!("dispatch task stopped");
}
