//! fs-dispatch - filesystem calls as events serviced by one consumer task.
//!
//! Application threads never touch the filesystem directly. Each call is
//! translated into an event record taken from a fixed-capacity pool, posted
//! to a bounded mailbox, and the calling thread suspends. A single dispatch
//! task drains the mailbox in FIFO order, performs the real blocking
//! filesystem operation through an [`FsBackend`], writes the result back
//! into the event record, and resumes the caller.
//!
//! Memory is bounded: the pool never grows, and a full pool surfaces as a
//! retriable [`CallError::NoSpaceAvailable`] rather than a blocking wait.
//!
//! # Example
//!
//! ```ignore
//! use fs_dispatch::{Config, FsBridge, OpenMode, StdFsBackend};
//!
//! let bridge = FsBridge::new(Config::default(), StdFsBackend::new());
//! let fd = bridge.open("/data/log.txt", OpenMode::Append)?;
//! bridge.write(fd, b"hello".to_vec())?;
//! bridge.close(fd)?;
//! ```

mod backend;
mod bridge;
mod config;
mod error;
mod metrics;
mod ops;
mod std_backend;

pub use backend::FsBackend;
pub use bridge::FsBridge;
pub use config::Config;
pub use error::{CallError, FsError};
pub use ops::{Access, DirDesc, FileDesc, FsReply, FsRequest, OpenMode};
pub use std_backend::StdFsBackend;
