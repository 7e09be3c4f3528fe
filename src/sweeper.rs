//! Removal of directories left empty by a pass.

use crate::config::is_hidden_name;
use crate::error::OrganizeError;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories removed by a sweep, plus the ones that could not be.
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// Removed directories, deepest first.
    pub removed: Vec<PathBuf>,
    pub failures: Vec<OrganizeError>,
}

/// Post-order sweep of empty directories below a root.
#[derive(Debug, Clone, Default)]
pub struct EmptyDirSweeper {
    purge_hidden: bool,
    include_hidden: bool,
    protected: Option<PathBuf>,
}

impl EmptyDirSweeper {
    /// A sweeper that only removes truly empty directories.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also treat directories holding nothing but hidden files as empty.
    /// The hidden files are deleted before the directory.
    pub fn with_purge_hidden(mut self, purge_hidden: bool) -> Self {
        self.purge_hidden = purge_hidden;
        self
    }

    /// Descend into hidden directories too. Without this, a hidden directory
    /// and everything below it is left untouched, matching the scan.
    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Never descend into or remove this subtree.
    pub fn with_protected(mut self, path: Option<PathBuf>) -> Self {
        self.protected = path;
        self
    }

    /// Removes every empty directory below `root`, leaf first. `root` itself
    /// is never removed.
    ///
    /// A dry run removes nothing but reports what a real sweep would remove,
    /// parents of removable directories included.
    pub fn sweep(&self, root: &Path, dry_run: bool) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let mut removed: HashSet<PathBuf> = HashSet::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_entry(|e| self.should_visit(e));

        for item in walker {
            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable entry during sweep");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let dir = entry.path();
            match self.sweep_dir(dir, &removed, dry_run) {
                Ok(true) => {
                    removed.insert(dir.to_path_buf());
                    outcome.removed.push(dir.to_path_buf());
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Leaving directory in place");
                    outcome.failures.push(e);
                }
            }
        }

        outcome
    }

    fn should_visit(&self, entry: &walkdir::DirEntry) -> bool {
        if self.protected.as_deref() == Some(entry.path()) {
            return false;
        }
        // the root is filtered too, despite min_depth
        if !self.include_hidden && entry.depth() > 0 && entry.file_type().is_dir() {
            return !entry.file_name().to_str().is_some_and(is_hidden_name);
        }
        true
    }

    fn sweep_dir(&self, dir: &Path, removed: &HashSet<PathBuf>, dry_run: bool) -> Result<bool, OrganizeError> {
        let failure = |source: io::Error| OrganizeError::SweepFailure {
            path: dir.to_path_buf(),
            source,
        };

        let mut hidden_files = Vec::new();
        for child in fs::read_dir(dir).map_err(failure)? {
            let child = child.map_err(failure)?;
            let path = child.path();
            // only a dry run leaves removed directories on disk
            if removed.contains(&path) {
                continue;
            }
            let is_dir = child.file_type().map_err(failure)?.is_dir();
            let hidden = child.file_name().to_str().is_some_and(is_hidden_name);
            if self.purge_hidden && hidden && !is_dir {
                hidden_files.push(path);
                continue;
            }
            return Ok(false);
        }

        if dry_run {
            tracing::info!("[DRY-RUN] would remove empty directory {}", dir.display());
            return Ok(true);
        }

        for file in &hidden_files {
            fs::remove_file(file).map_err(failure)?;
            tracing::debug!(path = %file.display(), "Removed hidden file");
        }
        fs::remove_dir(dir).map_err(failure)?;
        tracing::info!("Removed empty directory {}", dir.display());
        Ok(true)
    }
}
