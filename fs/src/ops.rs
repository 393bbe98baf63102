//! Operation and reply records.
//!
//! Every filesystem call is one [`FsRequest`] variant carrying its input
//! parameters, matched by one [`FsReply`] variant carrying its result. The
//! dispatch task is a single match over the request tag.

use std::path::PathBuf;

/// File open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Existing file, read only.
    Read,
    /// Create or truncate, read/write.
    Write,
    /// Create if missing, writes go to the end.
    Append,
}

/// Access class for permission checks and changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
}

/// Opaque handle to an open file, issued by the backend.
///
/// Carries the backend's slot index and generation, so a stale descriptor
/// fails validation instead of aliasing a reopened slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileDesc(u64);

impl FileDesc {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Opaque handle to an open directory iterator, issued by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirDesc(u64);

impl DirDesc {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// A filesystem operation with its input parameters.
#[derive(Debug)]
pub enum FsRequest {
    Open { path: PathBuf, mode: OpenMode },
    Close { fd: FileDesc },
    Read { fd: FileDesc, len: usize },
    Write { fd: FileDesc, data: Vec<u8> },
    ReadByte { fd: FileDesc },
    WriteByte { fd: FileDesc, byte: u8 },
    Skip { fd: FileDesc, count: i64 },
    Available { fd: FileDesc },
    Exists { path: PathBuf },
    Length { path: PathBuf },
    FreeSpace { path: PathBuf },
    TotalSpace { path: PathBuf },
    UsableSpace { path: PathBuf },
    IsDirectory { path: PathBuf },
    IsFile { path: PathBuf },
    IsHidden { path: PathBuf },
    LastModified { path: PathBuf },
    SetLastModified { path: PathBuf, epoch_ms: i64 },
    SetReadOnly { path: PathBuf },
    MakeDirectory { path: PathBuf },
    OpenDirectory { path: PathBuf },
    ReadDirectory { fd: DirDesc },
    CloseDirectory { fd: DirDesc },
    Rename { from: PathBuf, to: PathBuf },
    Create { path: PathBuf },
    Delete { path: PathBuf },
    CheckAccess { path: PathBuf, access: Access },
    SetPermission { path: PathBuf, access: Access, enable: bool, owner_only: bool },
}

/// Result of a completed operation.
#[derive(Debug)]
pub enum FsReply {
    /// Open file handle.
    File(FileDesc),
    /// Open directory handle.
    Dir(DirDesc),
    /// Bytes read; empty means end of file.
    Data(Vec<u8>),
    /// Bytes written.
    Written(usize),
    /// Single byte read, `None` at end of file.
    Byte(Option<u8>),
    /// A size or count.
    Size(u64),
    /// Bytes actually skipped.
    Skipped(i64),
    /// Boolean answer.
    Flag(bool),
    /// Milliseconds since the epoch, `None` when unrepresentable.
    Timestamp(Option<i64>),
    /// Next directory entry name, `None` at end of directory.
    Entry(Option<String>),
    /// Operation completed with nothing to report.
    Done,
}
