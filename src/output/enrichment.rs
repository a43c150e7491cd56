//! Enrichment artifact and error ledger
//!
//! Both are rewritten in full on every enrichment run. The artifact is a
//! single JSON array pretty-printed with four-space indentation.

use super::{write_atomic, OutputError, OutputResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::path::Path;
use tracing::info;

/// Write the enrichment artifact as a pretty JSON array
pub fn write_enrichment_artifact<T: Serialize>(path: &Path, results: &[T]) -> OutputResult<()> {
    let mut buffer = Vec::with_capacity(results.len() * 512);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    results
        .serialize(&mut serializer)
        .map_err(|e| OutputError::SerializationError(format!("Failed to encode results: {e}")))?;
    buffer.push(b'\n');

    write_atomic(path, &buffer)?;
    info!(path = %path.display(), results = results.len(), "Enrichment artifact written");
    Ok(())
}

/// Write the error ledger, one failing query URL per line
pub fn write_error_ledger(path: &Path, failed_queries: &[String]) -> OutputResult<()> {
    let mut contents = String::with_capacity(failed_queries.len() * 96);
    for query in failed_queries {
        contents.push_str(query);
        contents.push('\n');
    }
    write_atomic(path, contents.as_bytes())?;
    info!(path = %path.display(), failures = failed_queries.len(), "Error ledger written");
    Ok(())
}

/// Read an enrichment artifact back
pub fn read_enrichment_results<T: DeserializeOwned>(path: &Path) -> OutputResult<Vec<T>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| OutputError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&contents)
        .map_err(|e| OutputError::SerializationError(format!("Failed to decode results: {e}")))
}

/// Read an error ledger back
pub fn read_error_ledger(path: &Path) -> OutputResult<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| OutputError::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}
