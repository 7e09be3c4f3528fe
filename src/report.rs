//! Aggregate counters for one organize pass.

use crate::error::OrganizeError;
use crate::plan::PlannedMove;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One per-file or per-directory failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub path: PathBuf,
    pub kind: String,
    pub message: String,
}

/// Result of a pass. Built by the engine, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Regular files accepted by the scan.
    pub scanned: usize,
    /// Files relocated (or that would be, in a dry run).
    pub moved: usize,
    /// Files left where they are: already in place, or abandoned on cancel.
    pub skipped: usize,
    pub duplicate_groups: usize,
    pub duplicates_removed: usize,
    pub duplicates_linked: usize,
    pub errors: usize,
    pub dirs_swept: usize,
    /// Symlinks added to the link index.
    pub links_created: usize,
    pub dry_run: bool,
    pub cancelled: bool,
    /// Moves per destination bucket.
    pub buckets: BTreeMap<String, usize>,
    /// The planned moves; only filled in a dry run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preview: Vec<PlannedMove>,
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Counts an error and keeps its details.
    pub fn record_error(&mut self, error: &OrganizeError) {
        self.push_failure(error.path(), error.kind(), error.to_string());
    }

    /// Counts a directory the scan could not descend into.
    pub fn record_walk_error(&mut self, path: &Path, message: &str) {
        self.push_failure(path, "scan_failure", message.to_string());
    }

    pub fn record_move(&mut self, bucket: &str) {
        self.moved += 1;
        *self.buckets.entry(bucket.to_string()).or_insert(0) += 1;
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    fn push_failure(&mut self, path: &Path, kind: &str, message: String) {
        self.errors += 1;
        self.failures.push(FailureRecord {
            path: path.to_path_buf(),
            kind: kind.to_string(),
            message,
        });
    }
}
