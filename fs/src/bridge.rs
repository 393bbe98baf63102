//! Producer API and dispatch task.
//!
//! Protocol, per call: reserve an event slot from the pool, stamp it with
//! the request and the calling thread's handle, post the slot id into the
//! bounded mailbox, suspend. The dispatch task performs the blocking
//! backend call with no lock held, writes the response into the same slot,
//! and resumes the owner. On resume the producer takes the response out of
//! the still-owned slot and releases it.
//!
//! Events are serviced strictly in mailbox order: one bounded channel, one
//! consumer.

use crate::backend::FsBackend;
use crate::config::Config;
use crate::error::{CallError, FsError};
use crate::metrics::{EVENTS_DISPATCHED, EVENTS_FAILED, POOL_EXHAUSTED};
use crate::ops::{Access, DirDesc, FileDesc, FsReply, FsRequest, OpenMode};
use bridge_core::suspend::{suspend_current, ThreadHandle};
use bridge_core::{Pool, SlotId};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, trace, warn};

#[derive(Default)]
struct FsEvent {
    owner: Option<ThreadHandle>,
    request: Option<FsRequest>,
    response: Option<Result<FsReply, FsError>>,
}

struct Shared {
    pool: Mutex<Pool<FsEvent>>,
}

/// The filesystem bridge: producer-facing API plus its dispatch task.
pub struct FsBridge {
    shared: Arc<Shared>,
    /// Taken (and thereby disconnected) on shutdown; the task drains what
    /// was already posted and exits.
    tx: Mutex<Option<Sender<SlotId>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FsBridge {
    /// Create the bridge and start its dispatch task over `backend`.
    pub fn new<B: FsBackend>(config: Config, backend: B) -> FsBridge {
        let shared = Arc::new(Shared {
            pool: Mutex::new(Pool::new(config.pool_size, FsEvent::default)),
        });
        // mailbox capacity equals pool capacity: a reserved event can
        // always be posted
        let (tx, rx) = crossbeam_channel::bounded::<SlotId>(config.pool_size);
        let task_shared = shared.clone();
        let yield_after_event = config.yield_after_event;
        let task = std::thread::Builder::new()
            .name("fs-dispatch".to_string())
            .spawn(move || run(task_shared, rx, backend, yield_after_event))
            .expect("failed to spawn fs dispatch task");
        FsBridge {
            shared,
            tx: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
        }
    }

    /// Issue one filesystem operation and block until it is serviced.
    ///
    /// Fails fast with [`CallError::NoSpaceAvailable`] when the event pool
    /// is exhausted (nothing was posted; retry later) and with
    /// [`CallError::NotRunning`] after shutdown.
    pub fn call(&self, request: FsRequest) -> Result<FsReply, CallError> {
        let slot = {
            let tx = self.tx.lock();
            let Some(tx) = tx.as_ref() else {
                return Err(CallError::NotRunning);
            };

            let mut pool = self.shared.pool.lock();
            let slot = pool.reserve().map_err(|_| {
                POOL_EXHAUSTED.increment();
                CallError::NoSpaceAvailable
            })?;
            let event = pool.get_mut(slot).expect("slot was just reserved");
            event.owner = Some(ThreadHandle::current());
            event.request = Some(request);
            event.response = None;
            drop(pool);

            if tx.try_send(slot).is_err() {
                // capacities match by construction, so this is a logic
                // error; un-reserve so no slot is orphaned
                error!("fs mailbox rejected a post despite matching capacity");
                let mut pool = self.shared.pool.lock();
                if let Ok(event) = pool.get_mut(slot) {
                    event.owner = None;
                    event.request = None;
                }
                let _ = pool.release(slot);
                return Err(CallError::MailboxFull);
            }
            slot
        };

        // the dispatch task resumes us once the response is in place; any
        // earlier permit is spurious, go back to sleep
        loop {
            suspend_current(None);
            let mut pool = self.shared.pool.lock();
            let event = pool.get_mut(slot).expect("slot held until release");
            if event.response.is_some() {
                let response = event.response.take();
                event.owner = None;
                pool.release(slot).expect("slot held until release");
                return response
                    .ok_or(CallError::MissingResponse)?
                    .map_err(CallError::Fs);
            }
            drop(pool);
            trace!("spurious resume while waiting for fs response");
        }
    }

    /// Events posted but not yet picked up by the dispatch task.
    pub fn queued(&self) -> usize {
        self.tx.lock().as_ref().map_or(0, |tx| tx.len())
    }

    /// Stop the dispatch task.
    ///
    /// Already-posted events are still serviced (and their callers
    /// resumed); subsequent calls fail with [`CallError::NotRunning`].
    pub fn shutdown(&self) {
        drop(self.tx.lock().take());
        if let Some(task) = self.task.lock().take() {
            if task.join().is_err() {
                warn!("fs dispatch task panicked");
            }
        }
    }
}

impl Drop for FsBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<B: FsBackend>(
    shared: Arc<Shared>,
    rx: Receiver<SlotId>,
    mut backend: B,
    yield_after_event: bool,
) {
    debug!("fs dispatch task running");
    let mut media_ready = false;

    // recv fails once the sender is dropped and the mailbox is drained
    while let Ok(slot) = rx.recv() {
        let (request, owner) = {
            let mut pool = shared.pool.lock();
            match pool.get_mut(slot) {
                Ok(event) => (event.request.take(), event.owner.clone()),
                Err(_) => {
                    error!("posted event is not in the pool");
                    continue;
                }
            }
        };
        let Some(request) = request else {
            error!("posted event has no request");
            continue;
        };

        if !media_ready {
            match backend.init_media() {
                Ok(()) => media_ready = true,
                Err(e) => warn!("media initialization failed: {e}"),
            }
        }

        trace!(?request, "servicing event");
        let response = service(&mut backend, request);
        EVENTS_DISPATCHED.increment();
        if response.is_err() {
            EVENTS_FAILED.increment();
        }

        {
            let mut pool = shared.pool.lock();
            match pool.get_mut(slot) {
                Ok(event) => event.response = Some(response),
                Err(_) => error!("event slot vanished while servicing"),
            }
        }

        match owner {
            Some(owner) => owner.resume(),
            None => warn!("serviced event has no owner to resume"),
        }

        if yield_after_event {
            std::thread::yield_now();
        }
    }
    debug!("fs dispatch task stopped");
}

fn service<B: FsBackend>(backend: &mut B, request: FsRequest) -> Result<FsReply, FsError> {
    use FsRequest::*;
    match request {
        Open { path, mode } => backend.open(&path, mode).map(FsReply::File),
        Close { fd } => backend.close(fd).map(|_| FsReply::Done),
        Read { fd, len } => backend.read(fd, len).map(FsReply::Data),
        Write { fd, data } => backend.write(fd, &data).map(FsReply::Written),
        ReadByte { fd } => backend.read_byte(fd).map(FsReply::Byte),
        WriteByte { fd, byte } => backend.write_byte(fd, byte).map(|_| FsReply::Done),
        Skip { fd, count } => backend.skip(fd, count).map(FsReply::Skipped),
        Available { fd } => backend.available(fd).map(FsReply::Size),
        Exists { path } => backend.exists(&path).map(FsReply::Flag),
        Length { path } => backend.length(&path).map(FsReply::Size),
        FreeSpace { path } => backend.free_space(&path).map(FsReply::Size),
        TotalSpace { path } => backend.total_space(&path).map(FsReply::Size),
        UsableSpace { path } => backend.usable_space(&path).map(FsReply::Size),
        IsDirectory { path } => backend.is_directory(&path).map(FsReply::Flag),
        IsFile { path } => backend.is_file(&path).map(FsReply::Flag),
        IsHidden { path } => backend.is_hidden(&path).map(FsReply::Flag),
        LastModified { path } => backend.last_modified(&path).map(FsReply::Timestamp),
        SetLastModified { path, epoch_ms } => backend
            .set_last_modified(&path, epoch_ms)
            .map(|_| FsReply::Done),
        SetReadOnly { path } => backend.set_read_only(&path).map(|_| FsReply::Done),
        MakeDirectory { path } => backend.make_directory(&path).map(|_| FsReply::Done),
        OpenDirectory { path } => backend.open_directory(&path).map(FsReply::Dir),
        ReadDirectory { fd } => backend.read_directory(fd).map(FsReply::Entry),
        CloseDirectory { fd } => backend.close_directory(fd).map(|_| FsReply::Done),
        Rename { from, to } => backend.rename(&from, &to).map(|_| FsReply::Done),
        Create { path } => backend.create(&path).map(FsReply::Flag),
        Delete { path } => backend.delete(&path).map(|_| FsReply::Done),
        CheckAccess { path, access } => backend.check_access(&path, access).map(FsReply::Flag),
        SetPermission {
            path,
            access,
            enable,
            owner_only,
        } => backend
            .set_permission(&path, access, enable, owner_only)
            .map(|_| FsReply::Done),
    }
}

// Typed wrappers over `call`, one per operation.
impl FsBridge {
    pub fn open(&self, path: impl Into<PathBuf>, mode: OpenMode) -> Result<FileDesc, CallError> {
        match self.call(FsRequest::Open {
            path: path.into(),
            mode,
        })? {
            FsReply::File(fd) => Ok(fd),
            _ => Err(CallError::UnexpectedReply),
        }
    }

    pub fn close(&self, fd: FileDesc) -> Result<(), CallError> {
        self.call(FsRequest::Close { fd }).map(|_| ())
    }

    pub fn read(&self, fd: FileDesc, len: usize) -> Result<Vec<u8>, CallError> {
        match self.call(FsRequest::Read { fd, len })? {
            FsReply::Data(data) => Ok(data),
            _ => Err(CallError::UnexpectedReply),
        }
    }

    pub fn write(&self, fd: FileDesc, data: Vec<u8>) -> Result<usize, CallError> {
        match self.call(FsRequest::Write { fd, data })? {
            FsReply::Written(n) => Ok(n),
            _ => Err(CallError::UnexpectedReply),
        }
    }

    pub fn read_byte(&self, fd: FileDesc) -> Result<Option<u8>, CallError> {
        match self.call(FsRequest::ReadByte { fd })? {
            FsReply::Byte(b) => Ok(b),
            _ => Err(CallError::UnexpectedReply),
        }
    }

    pub fn write_byte(&self, fd: FileDesc, byte: u8) -> Result<(), CallError> {
        self.call(FsRequest::WriteByte { fd, byte }).map(|_| ())
    }

    pub fn skip(&self, fd: FileDesc, count: i64) -> Result<i64, CallError> {
        match self.call(FsRequest::Skip { fd, count })? {
            FsReply::Skipped(n) => Ok(n),
            _ => Err(CallError::UnexpectedReply),
        }
    }

    pub fn available(&self, fd: FileDesc) -> Result<u64, CallError> {
        match self.call(FsRequest::Available { fd })? {
            FsReply::Size(n) => Ok(n),
            _ => Err(CallError::UnexpectedReply),
        }
    }

    pub fn exists(&self, path: impl Into<PathBuf>) -> Result<bool, CallError> {
        self.flag(FsRequest::Exists { path: path.into() })
    }

    pub fn length(&self, path: impl Into<PathBuf>) -> Result<u64, CallError> {
        self.size(FsRequest::Length { path: path.into() })
    }

    pub fn free_space(&self, path: impl Into<PathBuf>) -> Result<u64, CallError> {
        self.size(FsRequest::FreeSpace { path: path.into() })
    }

    pub fn total_space(&self, path: impl Into<PathBuf>) -> Result<u64, CallError> {
        self.size(FsRequest::TotalSpace { path: path.into() })
    }

    pub fn usable_space(&self, path: impl Into<PathBuf>) -> Result<u64, CallError> {
        self.size(FsRequest::UsableSpace { path: path.into() })
    }

    pub fn is_directory(&self, path: impl Into<PathBuf>) -> Result<bool, CallError> {
        self.flag(FsRequest::IsDirectory { path: path.into() })
    }

    pub fn is_file(&self, path: impl Into<PathBuf>) -> Result<bool, CallError> {
        self.flag(FsRequest::IsFile { path: path.into() })
    }

    pub fn is_hidden(&self, path: impl Into<PathBuf>) -> Result<bool, CallError> {
        self.flag(FsRequest::IsHidden { path: path.into() })
    }

    pub fn last_modified(&self, path: impl Into<PathBuf>) -> Result<Option<i64>, CallError> {
        match self.call(FsRequest::LastModified { path: path.into() })? {
            FsReply::Timestamp(t) => Ok(t),
            _ => Err(CallError::UnexpectedReply),
        }
    }

    pub fn set_last_modified(
        &self,
        path: impl Into<PathBuf>,
        epoch_ms: i64,
    ) -> Result<(), CallError> {
        self.call(FsRequest::SetLastModified {
            path: path.into(),
            epoch_ms,
        })
        .map(|_| ())
    }

    pub fn set_read_only(&self, path: impl Into<PathBuf>) -> Result<(), CallError> {
        self.call(FsRequest::SetReadOnly { path: path.into() }).map(|_| ())
    }

    pub fn make_directory(&self, path: impl Into<PathBuf>) -> Result<(), CallError> {
        self.call(FsRequest::MakeDirectory { path: path.into() }).map(|_| ())
    }

    pub fn open_directory(&self, path: impl Into<PathBuf>) -> Result<DirDesc, CallError> {
        match self.call(FsRequest::OpenDirectory { path: path.into() })? {
            FsReply::Dir(fd) => Ok(fd),
            _ => Err(CallError::UnexpectedReply),
        }
    }

    pub fn read_directory(&self, fd: DirDesc) -> Result<Option<String>, CallError> {
        match self.call(FsRequest::ReadDirectory { fd })? {
            FsReply::Entry(entry) => Ok(entry),
            _ => Err(CallError::UnexpectedReply),
        }
    }

    pub fn close_directory(&self, fd: DirDesc) -> Result<(), CallError> {
        self.call(FsRequest::CloseDirectory { fd }).map(|_| ())
    }

    pub fn rename(
        &self,
        from: impl Into<PathBuf>,
        to: impl Into<PathBuf>,
    ) -> Result<(), CallError> {
        self.call(FsRequest::Rename {
            from: from.into(),
            to: to.into(),
        })
        .map(|_| ())
    }

    pub fn create(&self, path: impl Into<PathBuf>) -> Result<bool, CallError> {
        self.flag(FsRequest::Create { path: path.into() })
    }

    pub fn delete(&self, path: impl Into<PathBuf>) -> Result<(), CallError> {
        self.call(FsRequest::Delete { path: path.into() }).map(|_| ())
    }

    pub fn check_access(
        &self,
        path: impl Into<PathBuf>,
        access: Access,
    ) -> Result<bool, CallError> {
        self.flag(FsRequest::CheckAccess {
            path: path.into(),
            access,
        })
    }

    pub fn set_permission(
        &self,
        path: impl Into<PathBuf>,
        access: Access,
        enable: bool,
        owner_only: bool,
    ) -> Result<(), CallError> {
        self.call(FsRequest::SetPermission {
            path: path.into(),
            access,
            enable,
            owner_only,
        })
        .map(|_| ())
    }

    fn flag(&self, request: FsRequest) -> Result<bool, CallError> {
        match self.call(request)? {
            FsReply::Flag(flag) => Ok(flag),
            _ => Err(CallError::UnexpectedReply),
        }
    }

    fn size(&self, request: FsRequest) -> Result<u64, CallError> {
        match self.call(request)? {
            FsReply::Size(size) => Ok(size),
            _ => Err(CallError::UnexpectedReply),
        }
    }
}
