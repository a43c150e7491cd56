//! Resume capability for harvest buckets
//!
//! Provides the record-artifact cursor and per-artifact file locking.

use crate::output::OutputError;

pub mod cursor;
pub mod lock;

pub use cursor::ResumeCursor;
pub use lock::{ArtifactGuard, ArtifactLock};

/// Resume errors
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),

    /// Another process holds the artifact lock
    #[error("artifact is locked by another process: {0}")]
    Locked(String),

    /// Checkpoint artifact could not be read or repaired
    #[error(transparent)]
    Output(#[from] OutputError),
}
