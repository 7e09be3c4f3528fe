//! Directory walk producing the entries an organize pass works on.

use crate::category::normalize_extension;
use crate::config::{CompiledFilters, is_hidden_name};
use crate::error::{OrganizeError, OrganizeResult};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use walkdir::{DirEntry, WalkDir};

/// One regular file under consideration during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    digest: Option<String>,
}

impl FileEntry {
    /// Creates an entry without a digest.
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            digest: None,
        }
    }

    /// Reads size and modification time from the filesystem.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::new(
            path.to_path_buf(),
            metadata.len(),
            metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        ))
    }

    /// The content digest, if it has been computed.
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Attaches a computed digest.
    pub fn attach_digest(&mut self, digest: String) {
        self.digest = Some(digest);
    }

    /// Number of normal path segments, used by the keeper rule.
    pub fn depth(&self) -> usize {
        self.path
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count()
    }
}

/// What to walk and what to leave out.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub recursive: bool,
    pub filters: CompiledFilters,
    /// Only files with one of these (normalized) extensions are kept.
    pub only_extensions: Option<HashSet<String>>,
    /// Keep at most this many files, in path order.
    pub limit: Option<usize>,
}

impl ScanOptions {
    /// Options with default filters and no limits.
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            recursive: false,
            filters: CompiledFilters::default(),
            only_extensions: None,
            limit: None,
        }
    }
}

/// Counters gathered while walking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Files dropped by hidden/exclude rules or the extension filter.
    pub excluded: usize,
    /// Files dropped because of the `limit`.
    pub beyond_limit: usize,
    /// Symlinks and other non-regular entries.
    pub not_regular: usize,
    /// Whether the destination subtree was encountered and pruned.
    pub destination_pruned: bool,
    /// Entries that could not be read, with the reason.
    pub walk_errors: Vec<(PathBuf, String)>,
}

/// Result of a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Retained entries, sorted by path.
    pub entries: Vec<FileEntry>,
    /// Canonical source root.
    pub source_root: PathBuf,
    /// Destination root resolved against the filesystem.
    pub destination_root: PathBuf,
    pub stats: ScanStats,
}

/// Checks that `source` is a readable directory and returns its canonical path.
///
/// # Errors
///
/// `SourceNotFound`, `SourceNotDirectory` or `SourceUnreadable`.
pub fn validate_source(source: &Path) -> OrganizeResult<PathBuf> {
    let metadata = match fs::metadata(source) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OrganizeError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(OrganizeError::SourceUnreadable {
                path: source.to_path_buf(),
                source: e,
            });
        }
    };
    if !metadata.is_dir() {
        return Err(OrganizeError::SourceNotDirectory {
            path: source.to_path_buf(),
        });
    }

    fs::read_dir(source).map_err(|e| OrganizeError::SourceUnreadable {
        path: source.to_path_buf(),
        source: e,
    })?;

    fs::canonicalize(source).map_err(|e| OrganizeError::SourceUnreadable {
        path: source.to_path_buf(),
        source: e,
    })
}

/// Resolves a path that may not exist yet.
///
/// The longest existing ancestor is canonicalized and the missing tail is
/// appended unchanged.
pub fn resolve_lenient(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path.to_path_buf();
    loop {
        if let Ok(resolved) = fs::canonicalize(&current) {
            return missing
                .iter()
                .rev()
                .fold(resolved, |acc: PathBuf, part: &std::ffi::OsString| acc.join(part));
        }
        match (current.file_name().map(|n| n.to_os_string()), current.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name);
                current = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(is_hidden_name)
        .unwrap_or(false)
}

/// Walks the source tree and returns the files to organize.
///
/// When the destination lies inside the source tree, its subtree is never
/// descended into. A destination equal to the source root organizes in place.
/// Symlinks are neither followed nor returned.
///
/// # Errors
///
/// Only the source preconditions are errors; unreadable entries below the
/// root are recorded in [`ScanStats::walk_errors`].
pub fn scan(options: &ScanOptions) -> OrganizeResult<ScanOutcome> {
    let source_root = validate_source(&options.source)?;
    let destination_root = resolve_lenient(&options.destination);
    // Only a destination nested inside the source can hold scanned files.
    let prune_destination =
        destination_root != source_root && destination_root.starts_with(&source_root);
    let include_hidden = options.filters.include_hidden();

    let mut stats = ScanStats::default();
    let mut entries = Vec::new();

    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut walker = WalkDir::new(&source_root)
        .follow_links(false)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter();

    while let Some(item) = walker.next() {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                stats.walk_errors.push((path, e.to_string()));
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            if prune_destination && entry.path().starts_with(&destination_root) {
                tracing::debug!(path = %entry.path().display(), "Skipping destination subtree");
                stats.destination_pruned = true;
                walker.skip_current_dir();
            } else if !include_hidden && is_hidden(&entry) {
                tracing::debug!(path = %entry.path().display(), "Skipping hidden directory");
                walker.skip_current_dir();
            }
            continue;
        }
        if !file_type.is_file() {
            stats.not_regular += 1;
            continue;
        }

        let path = entry.path();
        if prune_destination
            && path
                .parent()
                .is_some_and(|parent| parent.starts_with(&destination_root))
        {
            continue;
        }

        let rel_path = path.strip_prefix(&source_root).unwrap_or(path);
        if !options.filters.should_include(rel_path) {
            tracing::debug!(path = %path.display(), "Excluded by filters");
            stats.excluded += 1;
            continue;
        }

        if let Some(allowed) = &options.only_extensions {
            let ext = path
                .extension()
                .map(|e| normalize_extension(&e.to_string_lossy()))
                .unwrap_or_default();
            if !allowed.contains(&ext) {
                tracing::debug!(path = %path.display(), "Extension not selected");
                stats.excluded += 1;
                continue;
            }
        }

        match entry.metadata() {
            Ok(metadata) => entries.push(FileEntry::new(
                path.to_path_buf(),
                metadata.len(),
                metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            )),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot stat file");
                stats.walk_errors.push((path.to_path_buf(), e.to_string()));
            }
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    if let Some(limit) = options.limit
        && entries.len() > limit
    {
        stats.beyond_limit = entries.len() - limit;
        entries.truncate(limit);
    }

    tracing::debug!(
        retained = entries.len(),
        excluded = stats.excluded,
        "Scan finished"
    );

    Ok(ScanOutcome {
        entries,
        source_root,
        destination_root,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, content).expect("Failed to write test file");
    }

    fn names(outcome: &ScanOutcome) -> Vec<String> {
        outcome
            .entries
            .iter()
            .map(|e| {
                e.path
                    .strip_prefix(&outcome.source_root)
                    .expect("entry under source root")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn test_missing_source() {
        let result = scan(&ScanOptions::new("/no/such/dir", "/no/such/dir/_sorted"));
        assert!(matches!(result, Err(OrganizeError::SourceNotFound { .. })));
    }

    #[test]
    fn test_source_is_a_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), "file.txt", "x");
        let file = temp_dir.path().join("file.txt");
        let result = scan(&ScanOptions::new(&file, temp_dir.path()));
        assert!(matches!(
            result,
            Err(OrganizeError::SourceNotDirectory { .. })
        ));
    }

    #[test]
    fn test_non_recursive_scan_ignores_subdirectories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), "b.txt", "b");
        touch(temp_dir.path(), "a.txt", "a");
        touch(temp_dir.path(), "sub/c.txt", "c");

        let outcome = scan(&ScanOptions::new(
            temp_dir.path(),
            temp_dir.path().join("_sorted"),
        ))
        .expect("Failed to scan");

        assert_eq!(names(&outcome), vec!["a.txt", "b.txt"]);
        assert_eq!(outcome.entries[0].size, 1);
    }

    #[test]
    fn test_recursive_scan_skips_destination_and_hidden() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), "a.txt", "a");
        touch(temp_dir.path(), ".hidden", "h");
        touch(temp_dir.path(), ".git/config", "g");
        touch(temp_dir.path(), "sub/deep/c.txt", "c");
        touch(temp_dir.path(), "_sorted/others/old.txt", "o");

        let mut options = ScanOptions::new(temp_dir.path(), temp_dir.path().join("_sorted"));
        options.recursive = true;
        let outcome = scan(&options).expect("Failed to scan");

        assert_eq!(names(&outcome), vec!["a.txt", "sub/deep/c.txt"]);
        assert!(outcome.stats.destination_pruned);
        assert_eq!(outcome.stats.excluded, 1);
    }

    #[test]
    fn test_hidden_files_included_when_enabled() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), ".env", "x");
        touch(temp_dir.path(), ".cfg/app.toml", "y");

        let mut options = ScanOptions::new(temp_dir.path(), temp_dir.path().join("_sorted"));
        options.recursive = true;
        options.filters = CompiledFilters::default().with_hidden(true);
        let outcome = scan(&options).expect("Failed to scan");

        assert_eq!(names(&outcome), vec![".cfg/app.toml", ".env"]);
    }

    #[test]
    fn test_only_extensions_and_limit() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        for name in ["a.jpg", "b.JPG", "c.pdf", "d.jpg"] {
            touch(temp_dir.path(), name, name);
        }

        let mut options = ScanOptions::new(temp_dir.path(), temp_dir.path().join("_sorted"));
        options.only_extensions = Some(["jpg".to_string()].into_iter().collect());
        options.limit = Some(2);
        let outcome = scan(&options).expect("Failed to scan");

        assert_eq!(names(&outcome), vec!["a.jpg", "b.JPG"]);
        assert_eq!(outcome.stats.excluded, 1);
        assert_eq!(outcome.stats.beyond_limit, 1);
    }

    #[test]
    fn test_in_place_destination_is_not_pruned() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        touch(temp_dir.path(), "images/a.jpg", "a");

        let mut options = ScanOptions::new(temp_dir.path(), temp_dir.path());
        options.recursive = true;
        let outcome = scan(&options).expect("Failed to scan");

        assert_eq!(names(&outcome), vec!["images/a.jpg"]);
        assert!(!outcome.stats.destination_pruned);
    }

    #[test]
    fn test_resolve_lenient_keeps_missing_tail() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = fs::canonicalize(temp_dir.path()).expect("Failed to canonicalize");
        let resolved = resolve_lenient(&temp_dir.path().join("x").join("y"));
        assert_eq!(resolved, root.join("x").join("y"));
    }

    #[test]
    fn test_file_entry_digest_and_depth() {
        let mut entry = FileEntry::new(PathBuf::from("/a/b/c.txt"), 3, SystemTime::UNIX_EPOCH);
        assert_eq!(entry.digest(), None);
        entry.attach_digest("abc".to_string());
        assert_eq!(entry.digest(), Some("abc"));
        assert_eq!(entry.depth(), 3);
    }
}
