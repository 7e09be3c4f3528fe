/// Collision-safe file moves.
///
/// This module moves one file at a time into a destination directory. A
/// same-device move is a plain rename. When source and destination sit on
/// different devices the file is copied to a hidden partial file, verified,
/// renamed into place and only then removed from the source, so a failed move
/// always leaves the source intact.
use crate::error::{OrganizeError, OrganizeResult};
use crate::hasher::{self, HashAlgorithm};
use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Highest `(N)` suffix tried before giving up on a name.
pub const MAX_COLLISION_ATTEMPTS: u32 = 10_000;

/// Returns `name (n).ext` for a file name.
///
/// # Examples
///
/// ```
/// use std::ffi::OsStr;
/// use tidysort::relocator::disambiguated_name;
///
/// assert_eq!(disambiguated_name(OsStr::new("a.txt"), 1), "a (1).txt");
/// assert_eq!(disambiguated_name(OsStr::new("Makefile"), 2), "Makefile (2)");
/// ```
pub fn disambiguated_name(file_name: &OsStr, n: u32) -> OsString {
    let path = Path::new(file_name);
    let stem = path.file_stem().unwrap_or(file_name);

    let mut name = stem.to_os_string();
    name.push(format!(" ({})", n));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// True when anything, including a dangling symlink, occupies `path`.
pub fn path_taken(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Finds the first free name for `file_name` inside `dest_dir`.
///
/// `is_taken` decides whether a candidate is occupied, which lets the planner
/// also treat names it has already handed out as taken.
///
/// # Errors
///
/// `CollisionExhausted` once `MAX_COLLISION_ATTEMPTS` suffixes are in use.
pub fn free_destination<F>(dest_dir: &Path, file_name: &OsStr, mut is_taken: F) -> OrganizeResult<PathBuf>
where
    F: FnMut(&Path) -> bool,
{
    let candidate = dest_dir.join(file_name);
    if !is_taken(&candidate) {
        return Ok(candidate);
    }

    for n in 1..=MAX_COLLISION_ATTEMPTS {
        let candidate = dest_dir.join(disambiguated_name(file_name, n));
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(OrganizeError::CollisionExhausted {
        dir: dest_dir.to_path_buf(),
        name: file_name.to_string_lossy().into_owned(),
        attempts: MAX_COLLISION_ATTEMPTS,
    })
}

/// Hidden sibling used while a copy or link is in flight.
fn staging_path(target: &Path, tag: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.tidysort-{}-{}", name, tag, std::process::id()))
}

fn file_name_of(src: &Path) -> OrganizeResult<&OsStr> {
    src.file_name().ok_or_else(|| OrganizeError::MoveFailed {
        path: src.to_path_buf(),
        source: io::Error::new(ErrorKind::InvalidInput, "path has no file name"),
    })
}

/// Moves files without overwriting and without losing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomicRelocator {
    verify_digest: Option<HashAlgorithm>,
    force_copy: bool,
}

impl Default for AtomicRelocator {
    fn default() -> Self {
        Self::new()
    }
}

impl AtomicRelocator {
    /// A relocator that verifies cross-device copies by size and SHA-256.
    pub fn new() -> Self {
        Self {
            verify_digest: Some(HashAlgorithm::Sha256),
            force_copy: false,
        }
    }

    /// Sets the digest used to verify copies; `None` checks sizes only.
    pub fn with_digest_verification(mut self, algorithm: Option<HashAlgorithm>) -> Self {
        self.verify_digest = algorithm;
        self
    }

    /// Always copy, even when a rename would work.
    pub fn with_forced_copy(mut self, force_copy: bool) -> Self {
        self.force_copy = force_copy;
        self
    }

    /// Moves `src` into `dest_dir` under a name that is not yet taken.
    ///
    /// With `dry_run` the destination is computed and returned without
    /// creating directories or moving anything.
    ///
    /// # Errors
    ///
    /// `CollisionExhausted`, `MoveVerificationFailed` or `MoveFailed`. In every
    /// error case the source file is left where it was.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use tidysort::relocator::AtomicRelocator;
    ///
    /// let relocator = AtomicRelocator::new();
    /// let dest = relocator
    ///     .relocate(Path::new("/downloads/a.txt"), Path::new("/sorted/documents"), false)
    ///     .expect("move failed");
    /// println!("moved to {}", dest.display());
    /// ```
    pub fn relocate(&self, src: &Path, dest_dir: &Path, dry_run: bool) -> OrganizeResult<PathBuf> {
        let file_name = file_name_of(src)?;

        if !dry_run {
            fs::create_dir_all(dest_dir).map_err(|e| OrganizeError::MoveFailed {
                path: src.to_path_buf(),
                source: e,
            })?;
        }

        let dest = free_destination(dest_dir, file_name, path_taken)?;

        if dry_run {
            tracing::info!("[DRY-RUN] would move {} -> {}", src.display(), dest.display());
            return Ok(dest);
        }

        self.move_file(src, &dest)?;
        tracing::info!("{} -> {}", src.display(), dest.display());
        Ok(dest)
    }

    /// Moves `src` to a destination chosen earlier by a plan.
    ///
    /// If something appeared at `planned` since planning, a fresh name is
    /// searched for in the same directory.
    pub fn relocate_to(&self, src: &Path, planned: &Path) -> OrganizeResult<PathBuf> {
        let file_name = file_name_of(src)?;
        let dest_dir = planned.parent().unwrap_or_else(|| Path::new("."));

        fs::create_dir_all(dest_dir).map_err(|e| OrganizeError::MoveFailed {
            path: src.to_path_buf(),
            source: e,
        })?;

        let dest = if path_taken(planned) {
            tracing::warn!(planned = %planned.display(), "Planned destination was taken, choosing a new name");
            free_destination(dest_dir, file_name, path_taken)?
        } else {
            planned.to_path_buf()
        };

        self.move_file(src, &dest)?;
        tracing::info!("{} -> {}", src.display(), dest.display());
        Ok(dest)
    }

    /// Deletes a duplicate after checking its keeper is still present.
    ///
    /// # Errors
    ///
    /// `DuplicateActionFailed` when the keeper is gone or has changed size, or
    /// the duplicate cannot be removed.
    pub fn remove_duplicate(&self, duplicate: &Path, keeper: &Path) -> OrganizeResult<()> {
        check_keeper(duplicate, keeper, "remove")?;
        fs::remove_file(duplicate).map_err(|e| OrganizeError::DuplicateActionFailed {
            path: duplicate.to_path_buf(),
            action: "remove",
            reason: e.to_string(),
        })?;
        tracing::info!(keeper = %keeper.display(), "Removed duplicate {}", duplicate.display());
        Ok(())
    }

    /// Replaces a duplicate with a hard link to its keeper.
    ///
    /// The link is created under a staging name and renamed over the
    /// duplicate, so the duplicate path never disappears.
    pub fn link_duplicate(&self, duplicate: &Path, keeper: &Path) -> OrganizeResult<()> {
        check_keeper(duplicate, keeper, "link")?;

        let staging = staging_path(duplicate, "link");
        let linked = fs::hard_link(keeper, &staging).and_then(|()| fs::rename(&staging, duplicate));
        if let Err(e) = linked {
            let _ = fs::remove_file(&staging);
            return Err(OrganizeError::DuplicateActionFailed {
                path: duplicate.to_path_buf(),
                action: "link",
                reason: e.to_string(),
            });
        }

        tracing::info!(keeper = %keeper.display(), "Linked duplicate {}", duplicate.display());
        Ok(())
    }

    fn move_file(&self, src: &Path, dest: &Path) -> OrganizeResult<()> {
        if !self.force_copy {
            match fs::rename(src, dest) {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                    tracing::debug!(src = %src.display(), "Rename crosses devices, copying instead");
                }
                Err(e) => {
                    return Err(OrganizeError::MoveFailed {
                        path: src.to_path_buf(),
                        source: e,
                    });
                }
            }
        }

        self.copy_verify_replace(src, dest, |copy| self.verify_copy(src, copy))
    }

    fn verify_copy(&self, src: &Path, copy: &Path) -> Result<(), String> {
        let src_len = fs::metadata(src).map_err(|e| e.to_string())?.len();
        let copy_len = fs::metadata(copy).map_err(|e| e.to_string())?.len();
        if src_len != copy_len {
            return Err(format!("size mismatch: {} != {}", src_len, copy_len));
        }

        if let Some(algorithm) = self.verify_digest {
            let expected = hasher::digest(src, algorithm).map_err(|e| e.to_string())?;
            let actual = hasher::digest(copy, algorithm).map_err(|e| e.to_string())?;
            if expected != actual {
                return Err(format!("{} mismatch", algorithm));
            }
        }
        Ok(())
    }

    /// Copy to a staging file, verify, rename into place, delete the source.
    fn copy_verify_replace<F>(&self, src: &Path, dest: &Path, verify: F) -> OrganizeResult<()>
    where
        F: FnOnce(&Path) -> Result<(), String>,
    {
        let partial = staging_path(dest, "partial");

        if let Err(e) = copy_with_mtime(src, &partial) {
            let _ = fs::remove_file(&partial);
            return Err(OrganizeError::MoveFailed {
                path: src.to_path_buf(),
                source: e,
            });
        }

        if let Err(reason) = verify(&partial) {
            let _ = fs::remove_file(&partial);
            return Err(OrganizeError::MoveVerificationFailed {
                source_path: src.to_path_buf(),
                destination: dest.to_path_buf(),
                reason,
            });
        }

        if let Err(e) = fs::rename(&partial, dest) {
            let _ = fs::remove_file(&partial);
            return Err(OrganizeError::MoveFailed {
                path: src.to_path_buf(),
                source: e,
            });
        }

        if let Err(e) = fs::remove_file(src) {
            // keep exactly one copy: the untouched source
            let _ = fs::remove_file(dest);
            return Err(OrganizeError::MoveFailed {
                path: src.to_path_buf(),
                source: e,
            });
        }

        Ok(())
    }
}

fn copy_with_mtime(src: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(src, dest)?;
    let modified = fs::metadata(src)?.modified()?;
    let file = File::options().write(true).open(dest)?;
    file.set_modified(modified)?;
    file.sync_all()
}

fn check_keeper(duplicate: &Path, keeper: &Path, action: &'static str) -> OrganizeResult<()> {
    let fail = |reason: String| OrganizeError::DuplicateActionFailed {
        path: duplicate.to_path_buf(),
        action,
        reason,
    };

    let keeper_len = fs::metadata(keeper)
        .map_err(|e| fail(format!("keeper {} unavailable: {}", keeper.display(), e)))?
        .len();
    let duplicate_len = fs::metadata(duplicate)
        .map_err(|e| fail(e.to_string()))?
        .len();
    if keeper_len != duplicate_len {
        return Err(fail(format!(
            "keeper {} changed size since hashing",
            keeper.display()
        )));
    }
    Ok(())
}
