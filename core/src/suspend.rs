//! Thread suspend/resume primitive.
//!
//! A producer thread submits a request and suspends itself; the dispatch
//! task resumes exactly that thread when the result is ready. The permit
//! semantics make the obvious race benign: a resume that lands before the
//! owner suspends is stored, and the next suspend returns immediately.
//! Multiple resumes before a suspend coalesce into a single permit.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

struct WaitCell {
    permit: Mutex<bool>,
    resumed: Condvar,
}

/// Result of [`suspend_current`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendOutcome {
    /// A resume permit was consumed.
    Resumed,
    /// The timeout elapsed before any resume arrived.
    TimedOut,
}

/// Cloneable identity of a suspendable thread.
///
/// Obtained with [`ThreadHandle::current`] and handed to a dispatch task so
/// it can resume the owner once a result is written.
#[derive(Clone)]
pub struct ThreadHandle {
    cell: Arc<WaitCell>,
}

thread_local! {
    static CURRENT: ThreadHandle = ThreadHandle {
        cell: Arc::new(WaitCell {
            permit: Mutex::new(false),
            resumed: Condvar::new(),
        }),
    };
}

impl ThreadHandle {
    /// Handle for the calling thread.
    pub fn current() -> ThreadHandle {
        CURRENT.with(|h| h.clone())
    }

    /// Deposit a resume permit and wake the owning thread.
    ///
    /// Safe to call before the owner suspends and safe to call repeatedly;
    /// permits do not accumulate beyond one.
    pub fn resume(&self) {
        let mut permit = self.cell.permit.lock();
        *permit = true;
        self.cell.resumed.notify_one();
    }

    /// Whether two handles refer to the same thread.
    pub fn same_thread(&self, other: &ThreadHandle) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadHandle({:p})", Arc::as_ptr(&self.cell))
    }
}

/// Suspend the calling thread until a resume permit is available.
///
/// Consumes the permit. With `timeout` of `None` this blocks indefinitely;
/// otherwise it gives up after the timeout and reports
/// [`SuspendOutcome::TimedOut`] without consuming anything. Spurious condvar
/// wakeups are absorbed internally.
pub fn suspend_current(timeout: Option<Duration>) -> SuspendOutcome {
    CURRENT.with(|h| {
        let cell = &h.cell;
        let mut permit = cell.permit.lock();
        match timeout {
            None => {
                while !*permit {
                    cell.resumed.wait(&mut permit);
                }
            }
            Some(timeout) => {
                let deadline = std::time::Instant::now() + timeout;
                while !*permit {
                    if cell.resumed.wait_until(&mut permit, deadline).timed_out() {
                        break;
                    }
                }
                if !*permit {
                    return SuspendOutcome::TimedOut;
                }
            }
        }
        *permit = false;
        SuspendOutcome::Resumed
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn resume_before_suspend_is_not_lost() {
        ThreadHandle::current().resume();
        let start = Instant::now();
        assert_eq!(suspend_current(Some(Duration::from_secs(5))), SuspendOutcome::Resumed);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn resume_from_other_thread_wakes() {
        let (tx, rx) = mpsc::channel();
        let waiter = thread::spawn(move || {
            tx.send(ThreadHandle::current()).unwrap();
            suspend_current(Some(Duration::from_secs(5)))
        });
        let handle = rx.recv().unwrap();
        thread::sleep(Duration::from_millis(20));
        handle.resume();
        assert_eq!(waiter.join().unwrap(), SuspendOutcome::Resumed);
    }

    #[test]
    fn suspend_times_out_without_resume() {
        let start = Instant::now();
        assert_eq!(
            suspend_current(Some(Duration::from_millis(50))),
            SuspendOutcome::TimedOut
        );
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn resumes_coalesce_to_one_permit() {
        let handle = ThreadHandle::current();
        handle.resume();
        handle.resume();
        handle.resume();
        assert_eq!(suspend_current(Some(Duration::from_secs(1))), SuspendOutcome::Resumed);
        // only one permit was stored
        assert_eq!(
            suspend_current(Some(Duration::from_millis(20))),
            SuspendOutcome::TimedOut
        );
    }
}
