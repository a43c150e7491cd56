//! Per-bucket link log
//!
//! The link log is written once, when a bucket is first walked. Its
//! presence is the signal that the walk is done; its line order is the
//! sequence-index order used by the record artifact.

use super::{write_atomic, OutputError, OutputResult};
use crate::ItemReference;
use std::path::Path;
use tracing::info;

/// Write the link log, one item location per line
pub fn write_link_log(path: &Path, items: &[ItemReference]) -> OutputResult<()> {
    let mut contents = String::with_capacity(items.len() * 64);
    for item in items {
        contents.push_str(&item.location);
        contents.push('\n');
    }
    write_atomic(path, contents.as_bytes())?;

    info!(path = %path.display(), links = items.len(), "Link log written");
    Ok(())
}

/// Read the link log
///
/// Lines are trimmed and blank lines dropped; the returned position of a
/// location is its sequence index.
pub fn read_link_log(path: &Path) -> OutputResult<Vec<String>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        OutputError::IoError(format!("Failed to read link log {}: {}", path.display(), e))
    })?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
