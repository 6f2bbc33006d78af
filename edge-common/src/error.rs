//! Shared error types for the edge cache workspace.
//!
//! Every crate in the workspace reports failures through [`CacheError`] so
//! the read path (§7 error handling) can match on a single enum instead of
//! threading crate-specific error types through the request pipeline.

/// Result alias used throughout the workspace.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by the cache subsystem.
///
/// Variants map directly onto the error kinds in spec.md §7: `NotFound` is
/// expected and cheap, `InvalidRange`/`MalformedHeader` terminate request
/// serving with a specific status, `Io`/`Watcher` are logged and treated as
/// a fall-through to the origin.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No cached object exists for the requested key.
    #[error("not found")]
    NotFound,

    /// A `Range` header could not be satisfied against the object size.
    #[error("invalid range")]
    InvalidRange,

    /// The header stream violated the `name:value\n` framing contract.
    #[error("malformed cache header: {0}")]
    MalformedHeader(String),

    /// Underlying storage I/O failed.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// The filesystem watcher failed to start or could not be updated.
    #[error("watcher error: {0}")]
    Watcher(String),

    /// The write failed because the client connection was gone.
    ///
    /// Distinguished from `Io` so callers can skip logging it (spec.md §7:
    /// client write errors are never logged).
    #[error("client write failed")]
    ClientWrite,
}

impl CacheError {
    /// True for errors that are expected in normal operation and should not
    /// be logged as warnings (spec.md §7 "ignorable" errors).
    pub fn is_ignorable(&self) -> bool {
        matches!(self, CacheError::NotFound | CacheError::ClientWrite)
    }
}
