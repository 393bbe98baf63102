//! Per-descriptor timeout cache.
//!
//! Maps a descriptor to its configured timeout and the absolute deadline of
//! its most recent wait. Consulted on retry to tell "the timeout really
//! passed" apart from "another thread consumed the wakeup", without
//! recomputing from socket options. Entries persist until overwritten or
//! explicitly removed when the descriptor is closed.

use parking_lot::Mutex;
use std::os::unix::io::RawFd;
use tracing::warn;

const UNSET: i64 = -1;

#[derive(Clone, Copy)]
struct Entry {
    fd: RawFd,
    timeout_ms: i64,
    deadline_ms: i64,
}

const EMPTY: Entry = Entry {
    fd: -1,
    timeout_ms: UNSET,
    deadline_ms: UNSET,
};

/// Fixed-capacity timeout cache keyed by descriptor.
pub struct TimeoutCache {
    entries: Mutex<Box<[Entry]>>,
}

impl TimeoutCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(vec![EMPTY; capacity].into_boxed_slice()),
        }
    }

    /// Record the configured (relative) timeout for `fd`.
    pub fn set_timeout(&self, fd: RawFd, timeout_ms: i64) {
        let mut entries = self.entries.lock();
        if let Some(entry) = find_or_insert(&mut entries, fd) {
            entry.timeout_ms = timeout_ms;
        }
    }

    /// Record the absolute deadline of the wait in flight for `fd`.
    /// A deadline of 0 means the wait is unbounded.
    pub fn set_deadline(&self, fd: RawFd, deadline_ms: i64) {
        let mut entries = self.entries.lock();
        if let Some(entry) = find_or_insert(&mut entries, fd) {
            entry.deadline_ms = deadline_ms;
        }
    }

    /// Configured timeout for `fd`, if one was recorded.
    pub fn timeout(&self, fd: RawFd) -> Option<i64> {
        let entries = self.entries.lock();
        entries
            .iter()
            .find(|e| e.fd == fd)
            .map(|e| e.timeout_ms)
            .filter(|t| *t != UNSET)
    }

    /// Absolute deadline recorded for `fd`, if one was recorded.
    pub fn deadline(&self, fd: RawFd) -> Option<i64> {
        let entries = self.entries.lock();
        entries
            .iter()
            .find(|e| e.fd == fd)
            .map(|e| e.deadline_ms)
            .filter(|d| *d != UNSET)
    }

    /// Drop the entry for `fd`, typically on close.
    pub fn remove(&self, fd: RawFd) {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|e| e.fd == fd) {
            Some(entry) => *entry = EMPTY,
            None => warn!(fd, "timeout cache remove for unknown descriptor"),
        }
    }

    /// Clear every entry.
    pub fn reset(&self) {
        let mut entries = self.entries.lock();
        entries.fill(EMPTY);
    }
}

fn find_or_insert<'a>(entries: &'a mut [Entry], fd: RawFd) -> Option<&'a mut Entry> {
    // position() instead of find() so the borrow doesn't pin the slice
    // across the fallback scan
    if let Some(i) = entries.iter().position(|e| e.fd == fd) {
        return Some(&mut entries[i]);
    }
    if let Some(i) = entries.iter().position(|e| e.fd == -1) {
        entries[i].fd = fd;
        return Some(&mut entries[i]);
    }
    warn!(fd, "timeout cache full, descriptor not tracked");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_reads_are_none() {
        let cache = TimeoutCache::new(4);
        assert_eq!(cache.timeout(3), None);
        assert_eq!(cache.deadline(3), None);
    }

    #[test]
    fn set_and_get_roundtrip() {
        let cache = TimeoutCache::new(4);
        cache.set_timeout(3, 250);
        cache.set_deadline(3, 10_000);
        assert_eq!(cache.timeout(3), Some(250));
        assert_eq!(cache.deadline(3), Some(10_000));
        // other descriptors unaffected
        assert_eq!(cache.timeout(4), None);
    }

    #[test]
    fn remove_clears_entry() {
        let cache = TimeoutCache::new(4);
        cache.set_timeout(3, 250);
        cache.remove(3);
        assert_eq!(cache.timeout(3), None);
        // slot is reusable
        cache.set_timeout(9, 10);
        assert_eq!(cache.timeout(9), Some(10));
    }

    #[test]
    fn reset_clears_everything() {
        let cache = TimeoutCache::new(4);
        cache.set_timeout(1, 10);
        cache.set_deadline(2, 500);
        cache.reset();
        assert_eq!(cache.timeout(1), None);
        assert_eq!(cache.deadline(2), None);
    }

    #[test]
    fn full_cache_drops_new_descriptors() {
        let cache = TimeoutCache::new(2);
        cache.set_timeout(1, 10);
        cache.set_timeout(2, 20);
        cache.set_timeout(3, 30);
        assert_eq!(cache.timeout(3), None);
        assert_eq!(cache.timeout(1), Some(10));
        assert_eq!(cache.timeout(2), Some(20));
    }
}
