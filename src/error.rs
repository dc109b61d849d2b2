//! Error taxonomy surfaced across the public API.
//!
//! One `thiserror`-derived enum per boundary: no stringly-typed catch-all,
//! an explicit `#[from] io::Error` variant, and a `to_errno()` mapping at
//! the edge instead of leaking backend-specific error types upward.

use std::io;
use thiserror::Error;

/// Errors raised by [`crate::object_store::ObjectStore`] implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object already exists: {0}")]
    AlreadyExists(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("operation not supported by this backend: {0}")]
    Unsupported(String),
    #[error("conditional request failed (etag mismatch)")]
    ConditionFailed,
    #[error("transient transport error: {0}")]
    Transient(String),
    #[error("fatal backend error: {0}")]
    Fatal(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while staging dirty blocks.
#[derive(Error, Debug)]
pub enum StageError {
    /// A transient/transport failure. The caller may retry; blocks that
    /// did not finish staging remain `dirty`.
    #[error("transient staging failure: {0}")]
    Transient(String),
    /// A fatal failure (auth, not-found mid-flush, quota). The BOL is left
    /// untouched beyond clean-flag updates for blocks that did succeed.
    #[error("fatal staging failure: {0}")]
    Fatal(String),
}

impl From<StoreError> for StageError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Transient(m) => StageError::Transient(m),
            StoreError::Io(e) => StageError::Transient(e.to_string()),
            other => StageError::Fatal(other.to_string()),
        }
    }
}

/// Errors raised by the flush/commit protocol.
#[derive(Error, Debug)]
pub enum FlushError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("commit rejected: conditional etag mismatch")]
    ConditionFailed,
}

/// Errors raised by the block identifier mint.
#[derive(Error, Debug)]
pub enum MintError {
    #[error("entropy source exhausted")]
    EntropyExhausted,
}

/// Top-level error type translated at the public API boundary into a POSIX
/// errno via [`FsError::to_errno`]. BOL-local invariant violations are
/// programming bugs and are never represented here — they panic instead.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("file exists: {0}")]
    AlreadyExists(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("operation not supported: {0}")]
    Unsupported(String),
    #[error("read offset out of range")]
    RangeError,
    #[error("io error: {0}")]
    Io(String),
}

impl FsError {
    /// Translate to the POSIX-ish errno surfaced to the FUSE layer.
    ///
    /// Callers outside this crate (the vnode glue) are expected to hand
    /// this value straight to their reply mechanism.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::AlreadyExists(_) => libc::EEXIST,
            FsError::PermissionDenied(_) => libc::EACCES,
            FsError::Unsupported(_) => libc::ENOTSUP,
            FsError::RangeError => libc::ERANGE,
            FsError::Io(_) => libc::EIO,
        }
    }
}

impl From<StoreError> for FsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(m) => FsError::NotFound(m),
            StoreError::AlreadyExists(m) => FsError::AlreadyExists(m),
            StoreError::PermissionDenied(m) => FsError::PermissionDenied(m),
            StoreError::Unsupported(m) => FsError::Unsupported(m),
            StoreError::ConditionFailed => FsError::Io("conditional commit failed".into()),
            StoreError::Transient(m) => FsError::Io(m),
            StoreError::Fatal(m) => FsError::Io(m),
            StoreError::Io(e) => FsError::Io(e.to_string()),
        }
    }
}

impl From<FlushError> for FsError {
    fn from(e: FlushError) -> Self {
        match e {
            FlushError::Stage(StageError::Transient(m)) => FsError::Io(m),
            FlushError::Stage(StageError::Fatal(m)) => FsError::Io(m),
            FlushError::Store(e) => e.into(),
            FlushError::ConditionFailed => FsError::Io("conditional commit failed".into()),
        }
    }
}
