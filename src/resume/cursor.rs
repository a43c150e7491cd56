//! Resume cursor for the harvest stage
//!
//! The record artifact is its own checkpoint: the sequence index of its last
//! line is the highest item already accepted. The cursor is loaded once per
//! bucket and threaded through the harvest loop by value.

use super::ResumeError;
use crate::output::{last_sequence_index, repair_torn_tail};
use std::path::Path;
use tracing::info;

/// Highest sequence index already persisted for a bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeCursor {
    last_persisted: Option<u64>,
}

impl ResumeCursor {
    /// Cursor for a bucket with nothing persisted
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Cursor positioned after `index`
    pub fn after(index: u64) -> Self {
        Self {
            last_persisted: Some(index),
        }
    }

    /// Load the cursor from a record artifact
    ///
    /// A partial trailing line is truncated first. A missing or empty
    /// artifact yields a fresh cursor.
    pub fn load(records_path: &Path) -> Result<Self, ResumeError> {
        repair_torn_tail(records_path)?;
        let cursor = Self {
            last_persisted: last_sequence_index(records_path)?,
        };

        if let Some(index) = cursor.last_persisted {
            info!(
                path = %records_path.display(),
                last_index = index,
                "Resuming after last persisted record"
            );
        }
        Ok(cursor)
    }

    /// Last persisted index, if any
    pub fn last_persisted(&self) -> Option<u64> {
        self.last_persisted
    }

    /// Whether the item at `index` was already handled by an earlier run
    pub fn covers(&self, index: u64) -> bool {
        self.last_persisted.is_some_and(|last| index <= last)
    }

    /// Cursor after persisting the item at `index`
    pub fn advanced_to(self, index: u64) -> Self {
        Self {
            last_persisted: Some(self.last_persisted.map_or(index, |last| last.max(index))),
        }
    }

    /// First index not covered by the cursor
    pub fn next_index(&self) -> u64 {
        self.last_persisted.map_or(0, |last| last + 1)
    }
}
