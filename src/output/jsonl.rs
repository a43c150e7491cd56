//! Append-only JSON Lines record artifact
//!
//! Each accepted record is serialized to one line and synced to disk before
//! the next item is processed, so the last complete line is always a valid
//! resume checkpoint. A crash mid-write can leave a partial last line; it is
//! removed by [`repair_torn_tail`] before the artifact is read or appended.

use crate::VulnerabilityRecord;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{OutputError, OutputResult};

/// Wire name of the sequence index in a record line
const SEQUENCE_KEY: &str = "q_id";

/// Truncate a partial last line left by an interrupted append
///
/// Returns `true` when bytes were removed. A missing or empty file, or one
/// that already ends with a newline, is left untouched.
pub fn repair_torn_tail(path: &Path) -> OutputResult<bool> {
    let mut file = match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => {
            return Err(OutputError::IoError(format!(
                "Failed to open {}: {}",
                path.display(),
                e
            )))
        }
    };

    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .map_err(|e| OutputError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;

    if contents.is_empty() || contents.ends_with(b"\n") {
        return Ok(false);
    }

    let keep = contents
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|pos| pos + 1)
        .unwrap_or(0);

    file.set_len(keep as u64)
        .map_err(|e| OutputError::IoError(format!("Failed to truncate {}: {}", path.display(), e)))?;
    file.sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync {}: {}", path.display(), e)))?;

    warn!(
        path = %path.display(),
        removed_bytes = contents.len() - keep,
        "Removed partial trailing record left by an interrupted write"
    );
    Ok(true)
}

/// Sequence index of the last readable record, if any
///
/// Scans from the end so an unreadable last line does not hide the
/// checkpoint before it.
pub fn last_sequence_index(path: &Path) -> OutputResult<Option<u64>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(OutputError::IoError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };

    for line in contents.lines().rev().filter(|l| !l.trim().is_empty()) {
        let index = serde_json::from_str::<serde_json::Value>(line)
            .ok()
            .and_then(|value| value.get(SEQUENCE_KEY).and_then(|v| v.as_u64()));
        match index {
            Some(index) => return Ok(Some(index)),
            None => warn!(path = %path.display(), "Skipping unreadable record line"),
        }
    }

    Ok(None)
}

/// Read every persisted record in file order
///
/// Unreadable lines are logged and skipped.
pub fn read_records(path: &Path) -> OutputResult<Vec<VulnerabilityRecord>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        OutputError::IoError(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let mut records = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<VulnerabilityRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                path = %path.display(),
                line = line_no + 1,
                error = %e,
                "Skipping unreadable record line"
            ),
        }
    }

    debug!(path = %path.display(), records = records.len(), "Records loaded");
    Ok(records)
}

/// Append-only writer for the record artifact
///
/// The file is opened on the first append, so a bucket that persists
/// nothing leaves no record artifact behind. Opening repairs a torn tail
/// first; a failed append rolls the file back and drops the handle so the
/// next append reopens (and repairs) before writing.
pub struct RecordWriter {
    path: PathBuf,
    file: Option<File>,
    records_written: u64,
}

impl RecordWriter {
    /// Create a writer for `path` without touching the filesystem
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            records_written: 0,
        }
    }

    /// Number of records appended by this writer
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Artifact path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file(&mut self) -> OutputResult<&mut File> {
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    OutputError::IoError(format!("Failed to create directory: {e}"))
                })?;
            }
            repair_torn_tail(&self.path)?;
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| OutputError::IoError(format!("Failed to open file: {e}")))?;
            file.seek(SeekFrom::End(0))
                .map_err(|e| OutputError::IoError(format!("Failed to seek: {e}")))?;
            info!(path = %self.path.display(), "Opened record artifact for append");
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| OutputError::IoError("record artifact not open".to_string()))
    }

    /// Append one record as a single line and sync it to disk
    pub fn append(&mut self, record: &VulnerabilityRecord) -> OutputResult<()> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| OutputError::SerializationError(format!("Failed to encode record: {e}")))?;
        line.push('\n');

        let file = self.file()?;
        let start = file
            .metadata()
            .map_err(|e| OutputError::IoError(format!("Failed to stat file: {e}")))?
            .len();
        if let Err(e) = write_line(file, line.as_bytes()) {
            if let Err(rollback) = file.set_len(start) {
                warn!(path = %self.path.display(), error = %rollback, "Failed to roll back partial record");
            }
            self.file = None;
            return Err(e);
        }

        self.records_written += 1;
        debug!(
            q_id = record.sequence_index,
            cve_id = %record.identifier,
            "Record appended"
        );
        Ok(())
    }
}

fn write_line(file: &mut File, line: &[u8]) -> OutputResult<()> {
    file.write_all(line)
        .map_err(|e| OutputError::IoError(format!("Failed to write record: {e}")))?;
    file.flush()
        .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))?;
    file.sync_data()
        .map_err(|e| OutputError::FlushError(format!("Failed to sync: {e}")))
}
