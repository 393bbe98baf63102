//! `std::fs` backend with fixed-capacity handle tables.
//!
//! Open files and directory iterators live in pools sized at construction;
//! descriptors are the pool handles, so closing a file and reopening into
//! the same slot invalidates the old descriptor via its generation.

use crate::backend::FsBackend;
use crate::error::FsError;
use crate::ops::{Access, DirDesc, FileDesc, OpenMode};
use bridge_core::{Pool, PoolError, SlotId};
use std::fs::{self, File, OpenOptions, ReadDir};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::{Duration, UNIX_EPOCH};

const DEFAULT_MAX_OPEN_FILES: usize = 8;
const DEFAULT_MAX_OPEN_DIRS: usize = 8;

pub struct StdFsBackend {
    files: Pool<Option<File>>,
    dirs: Pool<Option<ReadDir>>,
}

impl Default for StdFsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StdFsBackend {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_OPEN_FILES, DEFAULT_MAX_OPEN_DIRS)
    }

    /// Bound the open-file and open-directory tables explicitly.
    pub fn with_limits(max_open_files: usize, max_open_dirs: usize) -> Self {
        Self {
            files: Pool::new(max_open_files, || None),
            dirs: Pool::new(max_open_dirs, || None),
        }
    }

    fn file_mut(&mut self, fd: FileDesc) -> Result<&mut File, FsError> {
        self.files
            .get_mut(SlotId::from_raw(fd.as_raw()))
            .ok()
            .and_then(|slot| slot.as_mut())
            .ok_or(FsError::InvalidDescriptor)
    }
}

fn map_pool_error(e: PoolError) -> FsError {
    match e {
        PoolError::NoSpaceAvailable => FsError::NoSpaceAvailable,
        PoolError::ItemNotFound => FsError::InvalidDescriptor,
    }
}

impl FsBackend for StdFsBackend {
    fn open(&mut self, path: &Path, mode: OpenMode) -> Result<FileDesc, FsError> {
        let file = match mode {
            OpenMode::Read => File::open(path)?,
            OpenMode::Write => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)?,
            OpenMode::Append => OpenOptions::new().append(true).create(true).open(path)?,
        };
        let slot = self.files.reserve().map_err(map_pool_error)?;
        *self.files.get_mut(slot).expect("slot was just reserved") = Some(file);
        Ok(FileDesc::from_raw(slot.as_u64()))
    }

    fn close(&mut self, fd: FileDesc) -> Result<(), FsError> {
        let slot = SlotId::from_raw(fd.as_raw());
        let file = self
            .files
            .get_mut(slot)
            .map_err(map_pool_error)?
            .take()
            .ok_or(FsError::InvalidDescriptor)?;
        drop(file);
        self.files.release(slot).map_err(map_pool_error)
    }

    fn read(&mut self, fd: FileDesc, len: usize) -> Result<Vec<u8>, FsError> {
        let file = self.file_mut(fd)?;
        let mut data = vec![0u8; len];
        let n = file.read(&mut data)?;
        data.truncate(n);
        Ok(data)
    }

    fn write(&mut self, fd: FileDesc, data: &[u8]) -> Result<usize, FsError> {
        let file = self.file_mut(fd)?;
        Ok(file.write(data)?)
    }

    fn read_byte(&mut self, fd: FileDesc) -> Result<Option<u8>, FsError> {
        let file = self.file_mut(fd)?;
        let mut byte = [0u8; 1];
        match file.read(&mut byte)? {
            0 => Ok(None),
            _ => Ok(Some(byte[0])),
        }
    }

    fn write_byte(&mut self, fd: FileDesc, byte: u8) -> Result<(), FsError> {
        let file = self.file_mut(fd)?;
        file.write_all(&[byte])?;
        Ok(())
    }

    fn skip(&mut self, fd: FileDesc, count: i64) -> Result<i64, FsError> {
        if count <= 0 {
            return Ok(0);
        }
        let file = self.file_mut(fd)?;
        let pos = file.stream_position()?;
        let len = file.metadata()?.len();
        // do not seek past the end; report what was actually skipped
        let skipped = (count as u64).min(len.saturating_sub(pos));
        file.seek(SeekFrom::Current(skipped as i64))?;
        Ok(skipped as i64)
    }

    fn available(&mut self, fd: FileDesc) -> Result<u64, FsError> {
        let file = self.file_mut(fd)?;
        let pos = file.stream_position()?;
        let len = file.metadata()?.len();
        Ok(len.saturating_sub(pos))
    }

    fn exists(&mut self, path: &Path) -> Result<bool, FsError> {
        Ok(path.exists())
    }

    fn length(&mut self, path: &Path) -> Result<u64, FsError> {
        Ok(fs::metadata(path)?.len())
    }

    fn free_space(&mut self, path: &Path) -> Result<u64, FsError> {
        statvfs(path).map(|s| s.free)
    }

    fn total_space(&mut self, path: &Path) -> Result<u64, FsError> {
        statvfs(path).map(|s| s.total)
    }

    fn usable_space(&mut self, path: &Path) -> Result<u64, FsError> {
        statvfs(path).map(|s| s.usable)
    }

    fn is_directory(&mut self, path: &Path) -> Result<bool, FsError> {
        Ok(path.is_dir())
    }

    fn is_file(&mut self, path: &Path) -> Result<bool, FsError> {
        Ok(path.is_file())
    }

    fn is_hidden(&mut self, path: &Path) -> Result<bool, FsError> {
        Ok(path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with('.')))
    }

    fn last_modified(&mut self, path: &Path) -> Result<Option<i64>, FsError> {
        let modified = fs::metadata(path)?.modified()?;
        Ok(modified
            .duration_since(UNIX_EPOCH)
            .ok()
            .map(|d| d.as_millis() as i64))
    }

    fn set_last_modified(&mut self, path: &Path, epoch_ms: i64) -> Result<(), FsError> {
        if epoch_ms < 0 {
            return Err(FsError::Unsupported);
        }
        let time = UNIX_EPOCH + Duration::from_millis(epoch_ms as u64);
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_modified(time)?;
        Ok(())
    }

    fn set_read_only(&mut self, path: &Path) -> Result<(), FsError> {
        // matching flash-filesystem behavior: the read-only attribute is
        // only managed for regular files
        let metadata = fs::metadata(path)?;
        if metadata.is_dir() {
            return Err(FsError::Unsupported);
        }
        let mut permissions = metadata.permissions();
        permissions.set_readonly(true);
        fs::set_permissions(path, permissions)?;
        Ok(())
    }

    fn make_directory(&mut self, path: &Path) -> Result<(), FsError> {
        fs::create_dir(path)?;
        Ok(())
    }

    fn open_directory(&mut self, path: &Path) -> Result<DirDesc, FsError> {
        let iter = fs::read_dir(path)?;
        let slot = self.dirs.reserve().map_err(map_pool_error)?;
        *self.dirs.get_mut(slot).expect("slot was just reserved") = Some(iter);
        Ok(DirDesc::from_raw(slot.as_u64()))
    }

    fn read_directory(&mut self, fd: DirDesc) -> Result<Option<String>, FsError> {
        let iter = self
            .dirs
            .get_mut(SlotId::from_raw(fd.as_raw()))
            .map_err(map_pool_error)?
            .as_mut()
            .ok_or(FsError::InvalidDescriptor)?;
        match iter.next() {
            None => Ok(None),
            Some(entry) => Ok(Some(entry?.file_name().to_string_lossy().into_owned())),
        }
    }

    fn close_directory(&mut self, fd: DirDesc) -> Result<(), FsError> {
        let slot = SlotId::from_raw(fd.as_raw());
        self.dirs
            .get_mut(slot)
            .map_err(map_pool_error)?
            .take()
            .ok_or(FsError::InvalidDescriptor)?;
        self.dirs.release(slot).map_err(map_pool_error)
    }

    fn rename(&mut self, from: &Path, to: &Path) -> Result<(), FsError> {
        fs::rename(from, to)?;
        Ok(())
    }

    fn create(&mut self, path: &Path) -> Result<bool, FsError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&mut self, path: &Path) -> Result<(), FsError> {
        if fs::metadata(path)?.is_dir() {
            fs::remove_dir(path)?;
        } else {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn check_access(&mut self, path: &Path, access: Access) -> Result<bool, FsError> {
        #[cfg(unix)]
        {
            use std::os::unix::ffi::OsStrExt;
            let path = std::ffi::CString::new(path.as_os_str().as_bytes())
                .map_err(|_| FsError::Unsupported)?;
            let mode = match access {
                Access::Read => libc::R_OK,
                Access::Write => libc::W_OK,
                Access::Execute => libc::X_OK,
            };
            Ok(unsafe { libc::access(path.as_ptr(), mode) } == 0)
        }
        #[cfg(not(unix))]
        {
            let metadata = fs::metadata(path)?;
            Ok(match access {
                Access::Read => true,
                Access::Write => !metadata.permissions().readonly(),
                Access::Execute => false,
            })
        }
    }

    fn set_permission(
        &mut self,
        path: &Path,
        access: Access,
        enable: bool,
        owner_only: bool,
    ) -> Result<(), FsError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let bits: u32 = match (access, owner_only) {
                (Access::Read, true) => 0o400,
                (Access::Read, false) => 0o444,
                (Access::Write, true) => 0o200,
                (Access::Write, false) => 0o222,
                (Access::Execute, true) => 0o100,
                (Access::Execute, false) => 0o111,
            };
            let metadata = fs::metadata(path)?;
            let mut mode = metadata.permissions().mode();
            if enable {
                mode |= bits;
            } else {
                mode &= !bits;
            }
            fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
            Ok(())
        }
        #[cfg(not(unix))]
        {
            let _ = (path, access, enable, owner_only);
            Err(FsError::Unsupported)
        }
    }
}

struct SpaceInfo {
    free: u64,
    total: u64,
    usable: u64,
}

#[cfg(unix)]
fn statvfs(path: &Path) -> Result<SpaceInfo, FsError> {
    use std::os::unix::ffi::OsStrExt;
    let path =
        std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| FsError::Unsupported)?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statvfs(path.as_ptr(), &mut stat) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    let frsize = stat.f_frsize as u64;
    Ok(SpaceInfo {
        free: stat.f_bfree as u64 * frsize,
        total: stat.f_blocks as u64 * frsize,
        usable: stat.f_bavail as u64 * frsize,
    })
}

#[cfg(not(unix))]
fn statvfs(_path: &Path) -> Result<SpaceInfo, FsError> {
    Err(FsError::Unsupported)
}
