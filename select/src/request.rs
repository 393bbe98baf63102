//! Pending-request pool with intrusive free/used lists.
//!
//! A fixed array of request slots carries two singly-linked lists threaded
//! through slot indices: the free list feeds allocation, the used list is
//! what the dispatch task scans every iteration. A request is on exactly one
//! list at a time. Submission pushes to the front of the used list, so
//! completion order within one pass is unspecified.
//!
//! The whole structure is guarded by one mutex at the call sites; nothing
//! here blocks or allocates.

use bridge_core::clock;
use bridge_core::ThreadHandle;
use std::os::unix::io::RawFd;

/// The readiness condition a request waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Wait until the descriptor is readable.
    Read,
    /// Wait until the descriptor is writable.
    Write,
}

impl Operation {
    pub(crate) fn poll_events(self) -> i16 {
        match self {
            Operation::Read => libc::POLLIN,
            Operation::Write => libc::POLLOUT,
        }
    }
}

/// One pending wait.
pub(crate) struct Request {
    pub fd: RawFd,
    pub op: Operation,
    /// Absolute deadline in monotonic milliseconds, [`clock::NO_DEADLINE`]
    /// for an unbounded wait.
    pub deadline_ms: i64,
    pub owner: Option<ThreadHandle>,
}

struct Entry {
    req: Request,
    next: Option<usize>,
}

pub(crate) struct RequestList {
    slots: Box<[Entry]>,
    free_head: Option<usize>,
    used_head: Option<usize>,
}

impl RequestList {
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|i| Entry {
                req: Request {
                    fd: -1,
                    op: Operation::Read,
                    deadline_ms: clock::NO_DEADLINE,
                    owner: None,
                },
                next: if i + 1 < capacity { Some(i + 1) } else { None },
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            free_head: if capacity > 0 { Some(0) } else { None },
            used_head: None,
        }
    }

    /// Move a slot from the free list to the front of the used list and fill
    /// it with `request`. `None` when the pool is exhausted.
    pub fn submit(&mut self, request: Request) -> Option<usize> {
        let idx = self.free_head?;
        self.free_head = self.slots[idx].next;
        self.slots[idx].req = request;
        self.slots[idx].next = self.used_head;
        self.used_head = Some(idx);
        Some(idx)
    }

    /// Walk the used list; every request for which `done` returns true is
    /// unlinked to the free list and its owner collected for resumption.
    pub fn complete_where(
        &mut self,
        mut done: impl FnMut(usize, &Request) -> bool,
    ) -> Vec<ThreadHandle> {
        let mut owners = Vec::new();
        let mut prev: Option<usize> = None;
        let mut cur = self.used_head;
        while let Some(idx) = cur {
            let next = self.slots[idx].next;
            if done(idx, &self.slots[idx].req) {
                match prev {
                    None => self.used_head = next,
                    Some(p) => self.slots[p].next = next,
                }
                if let Some(owner) = self.slots[idx].req.owner.take() {
                    owners.push(owner);
                }
                self.slots[idx].next = self.free_head;
                self.free_head = Some(idx);
            } else {
                prev = Some(idx);
            }
            cur = next;
        }
        owners
    }

    /// Unlink every pending request, collecting all owners.
    pub fn complete_all(&mut self) -> Vec<ThreadHandle> {
        self.complete_where(|_, _| true)
    }

    /// Force every pending request on `fd` to look timed out on the next
    /// evaluation pass. Used when a descriptor is closed out-of-band and the
    /// platform's close does not unblock a concurrent multiplexed wait.
    pub fn expire_fd(&mut self, fd: RawFd) {
        let now = clock::monotonic_ms().max(1);
        let mut cur = self.used_head;
        while let Some(idx) = cur {
            if self.slots[idx].req.fd == fd {
                self.slots[idx].req.deadline_ms = now;
            }
            cur = self.slots[idx].next;
        }
    }

    pub fn iter_used(&self) -> UsedIter<'_> {
        UsedIter {
            list: self,
            next: self.used_head,
        }
    }

    pub fn used_count(&self) -> usize {
        self.iter_used().count()
    }
}

pub(crate) struct UsedIter<'a> {
    list: &'a RequestList,
    next: Option<usize>,
}

impl<'a> Iterator for UsedIter<'a> {
    type Item = (usize, &'a Request);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        self.next = self.list.slots[idx].next;
        Some((idx, &self.list.slots[idx].req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(fd: RawFd, deadline_ms: i64) -> Request {
        Request {
            fd,
            op: Operation::Read,
            deadline_ms,
            owner: None,
        }
    }

    #[test]
    fn pool_capacity_is_hard() {
        let mut list = RequestList::with_capacity(2);
        assert!(list.submit(request(3, 0)).is_some());
        assert!(list.submit(request(4, 0)).is_some());
        assert!(list.submit(request(5, 0)).is_none());
        assert_eq!(list.used_count(), 2);
    }

    #[test]
    fn complete_moves_back_to_free() {
        let mut list = RequestList::with_capacity(2);
        list.submit(request(3, 0));
        list.submit(request(4, 0));
        list.complete_where(|_, req| req.fd == 3);
        assert_eq!(list.used_count(), 1);
        // freed slot is allocatable again
        assert!(list.submit(request(5, 0)).is_some());
        assert!(list.submit(request(6, 0)).is_none());
    }

    #[test]
    fn used_list_is_push_front() {
        let mut list = RequestList::with_capacity(3);
        list.submit(request(1, 0));
        list.submit(request(2, 0));
        list.submit(request(3, 0));
        let fds: Vec<RawFd> = list.iter_used().map(|(_, r)| r.fd).collect();
        assert_eq!(fds, vec![3, 2, 1]);
    }

    #[test]
    fn expire_fd_marks_only_matches() {
        let mut list = RequestList::with_capacity(3);
        list.submit(request(7, 0));
        list.submit(request(8, 0));
        list.submit(request(7, 0));
        list.expire_fd(7);
        for (_, req) in list.iter_used() {
            if req.fd == 7 {
                assert!(clock::expired(req.deadline_ms));
            } else {
                assert_eq!(req.deadline_ms, clock::NO_DEADLINE);
            }
        }
    }
}
