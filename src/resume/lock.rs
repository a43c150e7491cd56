//! Single-writer lock per artifact
//!
//! Advisory locking with fd-lock on a sibling `<artifact>.lock` file. A stage
//! holds the guard for as long as it writes a bucket's artifact; a second
//! process trying the same bucket fails fast instead of interleaving lines.

use super::ResumeError;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lock file guarding one artifact
pub struct ArtifactLock {
    lock_path: PathBuf,
    lock: RwLock<File>,
}

/// Held exclusive lock; released on drop
pub struct ArtifactGuard<'a> {
    _guard: RwLockWriteGuard<'a, File>,
}

/// Lock file path for an artifact (`results/2024_1.jsonl.lock`)
pub fn lock_path_for(artifact: &Path) -> PathBuf {
    let mut name: OsString = artifact
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".lock");
    artifact.with_file_name(name)
}

impl ArtifactLock {
    /// Open (creating if needed) the lock file for `artifact`
    pub fn open(artifact: &Path) -> Result<Self, ResumeError> {
        if let Some(parent) = artifact.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
        }

        let lock_path = lock_path_for(artifact);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| ResumeError::LockError(format!("Failed to open lock file: {e}")))?;

        Ok(Self {
            lock_path,
            lock: RwLock::new(file),
        })
    }

    /// Lock file path
    pub fn path(&self) -> &Path {
        &self.lock_path
    }

    /// Take the exclusive lock without blocking
    ///
    /// # Errors
    /// [`ResumeError::Locked`] when another holder has it.
    pub fn try_exclusive(&mut self) -> Result<ArtifactGuard<'_>, ResumeError> {
        let lock_path = self.lock_path.clone();
        match self.lock.try_write() {
            Ok(guard) => {
                debug!(path = %lock_path.display(), "Artifact lock acquired");
                Ok(ArtifactGuard { _guard: guard })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(ResumeError::Locked(lock_path.display().to_string()))
            }
            Err(e) => Err(ResumeError::LockError(format!(
                "Failed to acquire lock {}: {}",
                lock_path.display(),
                e
            ))),
        }
    }
}
