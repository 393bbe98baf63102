//! Integration tests for the FS bridge protocol.
//!
//! A gated test backend lets the tests control exactly when the dispatch
//! task finishes each blocking call, which makes queueing order and pool
//! occupancy observable.

use crossbeam_channel::{unbounded, Receiver, Sender};
use fs_dispatch::{
    Access, CallError, Config, DirDesc, FileDesc, FsBackend, FsBridge, FsError, OpenMode,
    StdFsBackend,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Backend whose `exists` calls block until the test sends a token, logging
/// each path as it is serviced.
struct GateBackend {
    log: Arc<Mutex<Vec<String>>>,
    gate: Receiver<()>,
}

impl GateBackend {
    fn new() -> (Self, Sender<()>, Arc<Mutex<Vec<String>>>) {
        let (gate_tx, gate_rx) = unbounded();
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: log.clone(),
                gate: gate_rx,
            },
            gate_tx,
            log,
        )
    }
}

impl FsBackend for GateBackend {
    fn exists(&mut self, path: &Path) -> Result<bool, FsError> {
        self.log
            .lock()
            .unwrap()
            .push(path.to_string_lossy().into_owned());
        self.gate.recv().expect("gate closed");
        Ok(true)
    }

    fn open(&mut self, _: &Path, _: OpenMode) -> Result<FileDesc, FsError> {
        Err(FsError::Unsupported)
    }
    fn close(&mut self, _: FileDesc) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }
    fn read(&mut self, _: FileDesc, _: usize) -> Result<Vec<u8>, FsError> {
        Err(FsError::Unsupported)
    }
    fn write(&mut self, _: FileDesc, _: &[u8]) -> Result<usize, FsError> {
        Err(FsError::Unsupported)
    }
    fn read_byte(&mut self, _: FileDesc) -> Result<Option<u8>, FsError> {
        Err(FsError::Unsupported)
    }
    fn write_byte(&mut self, _: FileDesc, _: u8) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }
    fn skip(&mut self, _: FileDesc, _: i64) -> Result<i64, FsError> {
        Err(FsError::Unsupported)
    }
    fn available(&mut self, _: FileDesc) -> Result<u64, FsError> {
        Err(FsError::Unsupported)
    }
    fn length(&mut self, _: &Path) -> Result<u64, FsError> {
        Err(FsError::Unsupported)
    }
    fn free_space(&mut self, _: &Path) -> Result<u64, FsError> {
        Err(FsError::Unsupported)
    }
    fn total_space(&mut self, _: &Path) -> Result<u64, FsError> {
        Err(FsError::Unsupported)
    }
    fn usable_space(&mut self, _: &Path) -> Result<u64, FsError> {
        Err(FsError::Unsupported)
    }
    fn is_directory(&mut self, _: &Path) -> Result<bool, FsError> {
        Err(FsError::Unsupported)
    }
    fn is_file(&mut self, _: &Path) -> Result<bool, FsError> {
        Err(FsError::Unsupported)
    }
    fn is_hidden(&mut self, _: &Path) -> Result<bool, FsError> {
        Err(FsError::Unsupported)
    }
    fn last_modified(&mut self, _: &Path) -> Result<Option<i64>, FsError> {
        Err(FsError::Unsupported)
    }
    fn set_last_modified(&mut self, _: &Path, _: i64) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }
    fn set_read_only(&mut self, _: &Path) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }
    fn make_directory(&mut self, _: &Path) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }
    fn open_directory(&mut self, _: &Path) -> Result<DirDesc, FsError> {
        Err(FsError::Unsupported)
    }
    fn read_directory(&mut self, _: DirDesc) -> Result<Option<String>, FsError> {
        Err(FsError::Unsupported)
    }
    fn close_directory(&mut self, _: DirDesc) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }
    fn rename(&mut self, _: &Path, _: &Path) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }
    fn create(&mut self, _: &Path) -> Result<bool, FsError> {
        Err(FsError::Unsupported)
    }
    fn delete(&mut self, _: &Path) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }
    fn check_access(&mut self, _: &Path, _: Access) -> Result<bool, FsError> {
        Err(FsError::Unsupported)
    }
    fn set_permission(&mut self, _: &Path, _: Access, _: bool, _: bool) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn events_are_serviced_in_post_order() {
    let (backend, gate, log) = GateBackend::new();
    let bridge = Arc::new(FsBridge::new(Config::default(), backend));

    // first caller: the task picks its event up and blocks in the backend
    let t1 = {
        let bridge = bridge.clone();
        thread::spawn(move || bridge.exists("a"))
    };
    wait_until("first event to start", || !log.lock().unwrap().is_empty());

    // second and third callers queue behind it, in a known order
    let t2 = {
        let bridge = bridge.clone();
        thread::spawn(move || bridge.exists("b"))
    };
    wait_until("second event to queue", || bridge.queued() == 1);
    let t3 = {
        let bridge = bridge.clone();
        thread::spawn(move || bridge.exists("c"))
    };
    wait_until("third event to queue", || bridge.queued() == 2);

    for _ in 0..3 {
        gate.send(()).unwrap();
    }
    assert!(t1.join().unwrap().unwrap());
    assert!(t2.join().unwrap().unwrap());
    assert!(t3.join().unwrap().unwrap());

    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn exhausted_event_pool_is_retriable() {
    let (backend, gate, log) = GateBackend::new();
    let config = Config {
        pool_size: 1,
        ..Config::default()
    };
    let bridge = Arc::new(FsBridge::new(config, backend));

    let t1 = {
        let bridge = bridge.clone();
        thread::spawn(move || bridge.exists("held"))
    };
    wait_until("event to start", || !log.lock().unwrap().is_empty());

    // the only slot is in flight; this call must fail fast, not block
    match bridge.exists("rejected") {
        Err(CallError::NoSpaceAvailable) => {}
        other => panic!("expected NoSpaceAvailable, got {other:?}"),
    }

    gate.send(()).unwrap();
    assert!(t1.join().unwrap().unwrap());

    // slot is free again; further calls go through
    gate.send(()).unwrap();
    assert!(bridge.exists("after").unwrap());
}

#[test]
fn shutdown_services_posted_events_then_rejects() {
    let (backend, gate, log) = GateBackend::new();
    let bridge = Arc::new(FsBridge::new(Config::default(), backend));

    let t1 = {
        let bridge = bridge.clone();
        thread::spawn(move || bridge.exists("a"))
    };
    wait_until("first event to start", || !log.lock().unwrap().is_empty());
    let t2 = {
        let bridge = bridge.clone();
        thread::spawn(move || bridge.exists("b"))
    };
    wait_until("second event to queue", || bridge.queued() == 1);

    gate.send(()).unwrap();
    gate.send(()).unwrap();
    bridge.shutdown();

    // both events posted before shutdown were serviced
    assert!(t1.join().unwrap().unwrap());
    assert!(t2.join().unwrap().unwrap());

    match bridge.exists("late") {
        Err(CallError::NotRunning) => {}
        other => panic!("expected NotRunning, got {other:?}"),
    }
}

#[test]
fn backend_errors_travel_in_the_event() {
    let (backend, gate, _log) = GateBackend::new();
    drop(gate); // unused; only unsupported ops are exercised
    let bridge = FsBridge::new(Config::default(), backend);

    match bridge.delete("nope") {
        Err(CallError::Fs(FsError::Unsupported)) => {}
        other => panic!("expected Unsupported, got {other:?}"),
    }
}

#[test]
fn std_backend_round_trip_through_the_bridge() {
    let dir = tempfile::tempdir().unwrap();
    let bridge = FsBridge::new(Config::default(), StdFsBackend::new());

    let file = dir.path().join("notes.txt");
    let fd = bridge.open(&file, OpenMode::Write).unwrap();
    assert_eq!(bridge.write(fd, b"hello world".to_vec()).unwrap(), 11);
    bridge.close(fd).unwrap();

    assert!(bridge.exists(&file).unwrap());
    assert!(bridge.is_file(&file).unwrap());
    assert_eq!(bridge.length(&file).unwrap(), 11);

    let fd = bridge.open(&file, OpenMode::Read).unwrap();
    assert_eq!(bridge.read(fd, 5).unwrap(), b"hello");
    assert_eq!(bridge.skip(fd, 1).unwrap(), 1);
    assert_eq!(bridge.available(fd).unwrap(), 5);
    assert_eq!(bridge.read(fd, 64).unwrap(), b"world");
    assert_eq!(bridge.read_byte(fd).unwrap(), None);
    bridge.close(fd).unwrap();

    let subdir = dir.path().join("sub");
    bridge.make_directory(&subdir).unwrap();
    assert!(bridge.is_directory(&subdir).unwrap());

    let renamed = dir.path().join("renamed.txt");
    bridge.rename(&file, &renamed).unwrap();
    assert!(!bridge.exists(&file).unwrap());

    let dd = bridge.open_directory(dir.path()).unwrap();
    let mut entries = Vec::new();
    while let Some(name) = bridge.read_directory(dd).unwrap() {
        entries.push(name);
    }
    bridge.close_directory(dd).unwrap();
    entries.sort();
    assert_eq!(entries, vec!["renamed.txt", "sub"]);

    bridge.delete(&renamed).unwrap();
    bridge.delete(&subdir).unwrap();
    assert!(!bridge.exists(&renamed).unwrap());
}
