//! Flat symlink index over the sorted tree.
//!
//! Every regular file below the destination root gets one symlink in a
//! single index directory, named after the file and disambiguated the same
//! way moves are. Files that already have a link in the index are skipped,
//! so running the index again only adds what is new.

use crate::error::OrganizeError;
use crate::relocator::{free_destination, path_taken};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the index directory created below the destination root when no
/// other location is given.
pub const LINK_INDEX_DIR: &str = "_index";

/// Links created by one indexing run, plus the files that could not be linked.
#[derive(Debug, Default)]
pub struct LinkOutcome {
    /// Link paths, in the order they were created.
    pub created: Vec<PathBuf>,
    pub failures: Vec<OrganizeError>,
}

/// Builds the index in one directory.
#[derive(Debug, Clone)]
pub struct LinkIndex {
    dir: PathBuf,
}

impl LinkIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Links every regular file below `root`, then every path in `pending`.
    ///
    /// `pending` holds files that are not on disk yet, such as the planned
    /// destinations of a dry run. A dry run creates nothing and reports the
    /// links it would create.
    pub fn build(&self, root: &Path, pending: &[PathBuf], dry_run: bool) -> LinkOutcome {
        let mut outcome = LinkOutcome::default();

        if !dry_run && let Err(source) = fs::create_dir_all(&self.dir) {
            let e = OrganizeError::LinkFailed {
                path: self.dir.clone(),
                source,
            };
            tracing::warn!(error = %e, "Cannot create index directory");
            outcome.failures.push(e);
            return outcome;
        }

        let mut linked = self.existing_targets();
        let mut reserved: HashSet<PathBuf> = HashSet::new();

        let mut targets = self.files_below(root);
        targets.extend(pending.iter().cloned());

        for target in targets {
            if !linked.insert(target.clone()) {
                continue;
            }
            let Some(name) = target.file_name() else {
                continue;
            };
            let link = match free_destination(&self.dir, name, |p| {
                reserved.contains(p) || path_taken(p)
            }) {
                Ok(link) => link,
                Err(e) => {
                    tracing::warn!(error = %e, "No free index name");
                    outcome.failures.push(e);
                    continue;
                }
            };
            reserved.insert(link.clone());

            if dry_run {
                tracing::info!(
                    "[DRY-RUN] would link {} -> {}",
                    link.display(),
                    target.display()
                );
            } else if let Err(source) = symlink(&target, &link) {
                let e = OrganizeError::LinkFailed {
                    path: target,
                    source,
                };
                tracing::warn!(error = %e, "Index link not created");
                outcome.failures.push(e);
                continue;
            } else {
                tracing::debug!(link = %link.display(), target = %target.display(), "Linked");
            }
            outcome.created.push(link);
        }

        outcome
    }

    fn files_below(&self, root: &Path) -> Vec<PathBuf> {
        if !root.is_dir() {
            return Vec::new();
        }
        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() != self.dir);
        for item in walker {
            match item {
                Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Skipping unreadable entry while indexing"),
            }
        }
        files
    }

    /// Targets of the links already in the index directory.
    fn existing_targets(&self) -> HashSet<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return HashSet::new();
        };
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| fs::read_link(entry.path()).ok())
            .collect()
    }
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, content).expect("Failed to write test file");
    }

    #[test]
    fn test_every_file_gets_one_link_with_distinct_names() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().join("sorted");
        write(&root.join("images").join("a.jpg"), "image");
        write(&root.join("others").join("a.jpg"), "not really");
        write(&root.join("others").join("b.txt"), "text");
        let index = LinkIndex::new(root.join(LINK_INDEX_DIR));

        let outcome = index.build(&root, &[], false);

        assert!(outcome.failures.is_empty());
        let dir = root.join(LINK_INDEX_DIR);
        assert_eq!(
            outcome.created,
            vec![dir.join("a.jpg"), dir.join("a (1).jpg"), dir.join("b.txt")]
        );
        assert_eq!(
            fs::read_link(dir.join("a.jpg")).expect("read link"),
            root.join("images").join("a.jpg")
        );
        assert_eq!(
            fs::read_to_string(dir.join("a (1).jpg")).expect("read through link"),
            "not really"
        );
    }

    #[test]
    fn test_second_run_only_links_new_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        write(&root.join("docs").join("a.pdf"), "a");
        let index = LinkIndex::new(root.join(LINK_INDEX_DIR));
        assert_eq!(index.build(&root, &[], false).created.len(), 1);

        write(&root.join("docs").join("b.pdf"), "b");
        let second = index.build(&root, &[], false);

        assert_eq!(second.created, vec![index.dir().join("b.pdf")]);
        assert!(!index.dir().join("a (1).pdf").exists());
    }

    #[test]
    fn test_dry_run_creates_nothing_and_counts_pending() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().join("sorted");
        let index = LinkIndex::new(root.join(LINK_INDEX_DIR));
        let pending = vec![root.join("images").join("x.jpg")];

        let outcome = index.build(&root, &pending, true);

        assert_eq!(outcome.created, vec![index.dir().join("x.jpg")]);
        assert!(!root.exists());
    }

    #[test]
    fn test_existing_plain_file_in_index_is_not_overwritten() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().join("sorted");
        write(&root.join("others").join("notes.txt"), "mine");
        write(&root.join(LINK_INDEX_DIR).join("notes.txt"), "someone else's");
        let index = LinkIndex::new(root.join(LINK_INDEX_DIR));

        let outcome = index.build(&root, &[], false);

        assert_eq!(outcome.created, vec![index.dir().join("notes (1).txt")]);
        assert_eq!(
            fs::read_to_string(index.dir().join("notes.txt")).expect("read"),
            "someone else's"
        );
    }
}
