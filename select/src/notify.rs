//! Wake mechanism for the dispatch task.
//!
//! The dispatch task blocks in a multiplexed wait; producers need a way to
//! make that wait return promptly when a new request arrives or a
//! descriptor is closed out-of-band. Two mechanisms provide the same
//! contract:
//!
//! - a non-blocking self-pipe whose read end sits in the poll set; wake is
//!   a one-byte write, and the read end is drained on wakeup so stale bytes
//!   do not re-trigger;
//! - a loopback TCP listener used purely as a pollable placeholder; wake is
//!   closing it, and the next iteration recreates it lazily.
//!
//! If neither descriptor can be allocated the selector degrades to polling
//! mode: every wait is bounded so new requests are noticed within the
//! configured bound. The degraded mode changes latency behavior and stays
//! observable through [`Notifier::mode`].

use crate::config::NotifyConfig;
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::io::RawFd;
use tracing::{debug, warn};

/// Effective wake mode of a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
    /// Self-pipe wake descriptor.
    Pipe,
    /// Loopback-listener wake descriptor.
    Loopback,
    /// No wake descriptor; waits are bounded by the polling fallback.
    Polling,
}

pub(crate) enum Notifier {
    Pipe { read: OwnedFd, write: OwnedFd },
    Loopback { listener: Mutex<Option<Socket>> },
    Polling,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Notifier {
        match config {
            NotifyConfig::Pipe => match Self::pipe() {
                Ok(notifier) => notifier,
                Err(e) => {
                    warn!("cannot create wake pipe, degrading to polling mode: {e}");
                    Notifier::Polling
                }
            },
            NotifyConfig::Loopback => Notifier::Loopback {
                listener: Mutex::new(None),
            },
            NotifyConfig::Polling => Notifier::Polling,
        }
    }

    fn pipe() -> io::Result<Notifier> {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        // both ends non-blocking: wake must not stall a producer and drain
        // must not stall the dispatch task
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        set_nonblocking(read.as_raw_fd())?;
        set_nonblocking(write.as_raw_fd())?;
        Ok(Notifier::Pipe { read, write })
    }

    pub fn mode(&self) -> NotifyMode {
        match self {
            Notifier::Pipe { .. } => NotifyMode::Pipe,
            Notifier::Loopback { .. } => NotifyMode::Loopback,
            Notifier::Polling => NotifyMode::Polling,
        }
    }

    /// The descriptor to include in the poll set, or `None` when running in
    /// (or temporarily degraded to) polling mode. For the loopback variant
    /// this lazily (re)creates the listener.
    pub fn poll_fd(&self) -> Option<RawFd> {
        match self {
            Notifier::Pipe { read, .. } => Some(read.as_raw_fd()),
            Notifier::Loopback { listener } => {
                let mut guard = listener.lock();
                if guard.is_none() {
                    match create_loopback() {
                        Ok(socket) => *guard = Some(socket),
                        Err(e) => {
                            debug!("cannot create loopback wake socket: {e}");
                            return None;
                        }
                    }
                }
                guard.as_ref().map(|s| s.as_raw_fd())
            }
            Notifier::Polling => None,
        }
    }

    /// Make an in-progress or about-to-start blocking wait return promptly.
    pub fn wake(&self) {
        match self {
            Notifier::Pipe { write, .. } => {
                let byte = [1u8];
                let res = unsafe {
                    libc::write(write.as_raw_fd(), byte.as_ptr() as *const libc::c_void, 1)
                };
                if res < 0 {
                    let err = io::Error::last_os_error();
                    // a full pipe already holds an undrained wake
                    if err.kind() != io::ErrorKind::WouldBlock {
                        warn!("wake pipe write failed: {err}");
                    }
                }
            }
            Notifier::Loopback { listener } => {
                // take and close while holding the lock: the dispatch task
                // must not recreate the listener while this close is in
                // flight, or the wake could hit the wrong descriptor
                let mut guard = listener.lock();
                drop(guard.take());
            }
            Notifier::Polling => {}
        }
    }

    /// Consume whatever made the wake descriptor ready.
    pub fn drain(&self) {
        if let Notifier::Pipe { read, .. } = self {
            let mut buf = [0u8; 32];
            loop {
                let res = unsafe {
                    libc::read(
                        read.as_raw_fd(),
                        buf.as_mut_ptr() as *mut libc::c_void,
                        buf.len(),
                    )
                };
                if res <= 0 {
                    break;
                }
            }
        }
        // loopback: the wake closed the listener, nothing to consume; the
        // next poll_fd() recreates it
    }
}

fn create_loopback() -> io::Result<Socket> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;
    let addr: SocketAddr = "127.0.0.1:0".parse().expect("loopback address");
    socket.bind(&addr.into())?;
    socket.listen(1)?;
    Ok(socket)
}

fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readable(fd: RawFd) -> bool {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let res = unsafe { libc::poll(&mut pfd, 1, 0) };
        res > 0 && (pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLNVAL)) != 0
    }

    #[test]
    fn pipe_wake_and_drain() {
        let notifier = Notifier::new(NotifyConfig::Pipe);
        assert_eq!(notifier.mode(), NotifyMode::Pipe);
        let fd = notifier.poll_fd().unwrap();

        assert!(!readable(fd));
        notifier.wake();
        assert!(readable(fd));

        // repeated wakes collapse into one drain
        notifier.wake();
        notifier.wake();
        notifier.drain();
        assert!(!readable(fd));
    }

    #[test]
    fn loopback_listener_is_recreated_after_wake() {
        let notifier = Notifier::new(NotifyConfig::Loopback);
        assert_eq!(notifier.mode(), NotifyMode::Loopback);
        assert!(notifier.poll_fd().is_some());

        // wake closes the listener; the next poll_fd lazily rebuilds one
        notifier.wake();
        let fresh = notifier.poll_fd().unwrap();
        assert!(!readable(fresh));

        // repeated wakes with no listener in between are harmless
        notifier.wake();
        notifier.wake();
        assert!(notifier.poll_fd().is_some());
    }

    #[test]
    fn polling_mode_has_no_descriptor() {
        let notifier = Notifier::new(NotifyConfig::Polling);
        assert_eq!(notifier.mode(), NotifyMode::Polling);
        assert!(notifier.poll_fd().is_none());
        notifier.wake(); // must be a harmless no-op
    }
}
