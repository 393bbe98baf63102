//! Error types for the FS dispatcher.

/// Errors produced by backend operations.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// A fixed-capacity handle table is full. Recoverable: close something
    /// and retry.
    #[error("no space available in handle table")]
    NoSpaceAvailable,
    /// The descriptor does not refer to a live handle (already closed, or
    /// stale from a previous occupancy of the slot).
    #[error("invalid or stale descriptor")]
    InvalidDescriptor,
    /// The operation has no meaningful implementation on this platform.
    #[error("not supported on this platform")]
    Unsupported,
    /// Underlying filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by the bridge protocol itself.
///
/// Backend failures travel inside the event record and surface here as
/// [`CallError::Fs`]; everything else is a submission-side condition.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The event pool is exhausted. Recoverable: retry later, the call had
    /// no effect.
    #[error("no event slot available")]
    NoSpaceAvailable,
    /// The dispatch task has been shut down.
    #[error("dispatch task is not running")]
    NotRunning,
    /// The mailbox rejected a post. Pool and mailbox capacities are kept
    /// equal by construction, so this indicates a bookkeeping bug rather
    /// than load.
    #[error("event mailbox full")]
    MailboxFull,
    /// The event completed without a response being written. Indicates a
    /// dispatch-task bug.
    #[error("event completed without a response")]
    MissingResponse,
    /// The reply variant did not match the request. Indicates a
    /// dispatch-task bug.
    #[error("unexpected reply variant")]
    UnexpectedReply,
    /// The backend reported a failure.
    #[error(transparent)]
    Fs(#[from] FsError),
}
