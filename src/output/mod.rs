//! Artifact writers and path layout
//!
//! Every bucket owns four artifacts: the link log, the append-only record
//! artifact, the enrichment artifact and the enrichment error ledger. Whole
//! documents (link log, enrichment, ledger) are replaced atomically; the
//! record artifact is appended one synced line at a time.

use std::io::Write;
use std::path::Path;
use tracing::debug;

pub mod enrichment;
pub mod jsonl;
pub mod link_log;
pub mod path;

pub use enrichment::{read_error_ledger, read_enrichment_results, write_enrichment_artifact, write_error_ledger};
pub use jsonl::{last_sequence_index, read_records, repair_torn_tail, RecordWriter};
pub use link_log::{read_link_log, write_link_log};
pub use path::{ArtifactLayout, ArtifactPaths};

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Replace `path` with `contents` in one step
///
/// Writes to a temp file in the same directory, syncs it, then renames it
/// over the target, so readers see either the old or the new document.
pub fn write_atomic(path: &Path, contents: &[u8]) -> OutputResult<()> {
    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent_dir)
        .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;

    temp_file
        .write_all(contents)
        .map_err(|e| OutputError::IoError(format!("Failed to write to temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| OutputError::FlushError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync temp file: {e}")))?;

    temp_file
        .persist(path)
        .map_err(|e| OutputError::IoError(format!("Failed to persist temp file: {e}")))?;

    if let Ok(dir) = std::fs::File::open(parent_dir) {
        let _ = dir.sync_all();
    }

    debug!(path = %path.display(), bytes = contents.len(), "Artifact written");
    Ok(())
}
