//! The vendor-call seam.
//!
//! One blocking method per operation, called only from the dispatch task,
//! never from a producer thread. Implementations are free to block; the
//! bridge guarantees no lock is held across these calls.

use crate::error::FsError;
use crate::ops::{Access, DirDesc, FileDesc, OpenMode};
use std::path::Path;

pub trait FsBackend: Send + 'static {
    /// One-time media initialization, attempted lazily before the first
    /// event is processed and retried on subsequent events until it
    /// succeeds. Failure is logged, not fatal.
    fn init_media(&mut self) -> Result<(), FsError> {
        Ok(())
    }

    fn open(&mut self, path: &Path, mode: OpenMode) -> Result<FileDesc, FsError>;
    fn close(&mut self, fd: FileDesc) -> Result<(), FsError>;
    fn read(&mut self, fd: FileDesc, len: usize) -> Result<Vec<u8>, FsError>;
    fn write(&mut self, fd: FileDesc, data: &[u8]) -> Result<usize, FsError>;
    fn read_byte(&mut self, fd: FileDesc) -> Result<Option<u8>, FsError>;
    fn write_byte(&mut self, fd: FileDesc, byte: u8) -> Result<(), FsError>;
    fn skip(&mut self, fd: FileDesc, count: i64) -> Result<i64, FsError>;
    fn available(&mut self, fd: FileDesc) -> Result<u64, FsError>;

    fn exists(&mut self, path: &Path) -> Result<bool, FsError>;
    fn length(&mut self, path: &Path) -> Result<u64, FsError>;
    fn free_space(&mut self, path: &Path) -> Result<u64, FsError>;
    fn total_space(&mut self, path: &Path) -> Result<u64, FsError>;
    fn usable_space(&mut self, path: &Path) -> Result<u64, FsError>;
    fn is_directory(&mut self, path: &Path) -> Result<bool, FsError>;
    fn is_file(&mut self, path: &Path) -> Result<bool, FsError>;
    fn is_hidden(&mut self, path: &Path) -> Result<bool, FsError>;
    fn last_modified(&mut self, path: &Path) -> Result<Option<i64>, FsError>;
    fn set_last_modified(&mut self, path: &Path, epoch_ms: i64) -> Result<(), FsError>;
    fn set_read_only(&mut self, path: &Path) -> Result<(), FsError>;

    fn make_directory(&mut self, path: &Path) -> Result<(), FsError>;
    fn open_directory(&mut self, path: &Path) -> Result<DirDesc, FsError>;
    fn read_directory(&mut self, fd: DirDesc) -> Result<Option<String>, FsError>;
    fn close_directory(&mut self, fd: DirDesc) -> Result<(), FsError>;

    fn rename(&mut self, from: &Path, to: &Path) -> Result<(), FsError>;
    /// Create a new empty file; `false` when it already existed.
    fn create(&mut self, path: &Path) -> Result<bool, FsError>;
    fn delete(&mut self, path: &Path) -> Result<(), FsError>;
    fn check_access(&mut self, path: &Path, access: Access) -> Result<bool, FsError>;
    fn set_permission(
        &mut self,
        path: &Path,
        access: Access,
        enable: bool,
        owner_only: bool,
    ) -> Result<(), FsError>;
}
