//! Error taxonomy for an organize pass.
//!
//! Only the source-path preconditions abort a pass. Every other variant is
//! recorded against the file or directory it concerns and the pass carries on.

use std::io;
use std::path::{Path, PathBuf};

/// Errors raised while scanning, hashing, relocating or sweeping.
#[derive(Debug, thiserror::Error)]
pub enum OrganizeError {
    /// The source directory does not exist.
    #[error("source directory not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// The source path exists but is not a directory.
    #[error("source is not a directory: {}", path.display())]
    SourceNotDirectory { path: PathBuf },

    /// The source directory could not be listed.
    #[error("cannot read source directory {}: {source}", path.display())]
    SourceUnreadable { path: PathBuf, source: io::Error },

    /// A file could not be read to completion while computing its digest.
    #[error("failed to hash {}: {source}", path.display())]
    HashFailure { path: PathBuf, source: io::Error },

    /// No free `name (N).ext` slot was found within the attempt limit.
    #[error("no free name for {name} in {} after {attempts} attempts", dir.display())]
    CollisionExhausted {
        dir: PathBuf,
        name: String,
        attempts: u32,
    },

    /// A cross-device copy did not match its source; the copy was discarded.
    #[error("copy of {} to {} failed verification: {reason}", source_path.display(), destination.display())]
    MoveVerificationFailed {
        source_path: PathBuf,
        destination: PathBuf,
        reason: String,
    },

    /// Any other filesystem failure during a move.
    #[error("failed to move {}: {source}", path.display())]
    MoveFailed { path: PathBuf, source: io::Error },

    /// Deleting or linking a duplicate failed; the duplicate is left as it was.
    #[error("failed to {action} duplicate {}: {reason}", path.display())]
    DuplicateActionFailed {
        path: PathBuf,
        action: &'static str,
        reason: String,
    },

    /// An index symlink could not be created; the indexed file is untouched.
    #[error("failed to link {} into the index: {source}", path.display())]
    LinkFailed { path: PathBuf, source: io::Error },

    /// A directory could not be removed during the sweep.
    #[error("failed to remove directory {}: {source}", path.display())]
    SweepFailure { path: PathBuf, source: io::Error },
}

impl OrganizeError {
    /// Returns true for errors that stop the whole pass before anything is scanned.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. }
                | Self::SourceNotDirectory { .. }
                | Self::SourceUnreadable { .. }
        )
    }

    /// The file or directory the error is about.
    pub fn path(&self) -> &Path {
        match self {
            Self::SourceNotFound { path }
            | Self::SourceNotDirectory { path }
            | Self::SourceUnreadable { path, .. }
            | Self::HashFailure { path, .. }
            | Self::MoveFailed { path, .. }
            | Self::DuplicateActionFailed { path, .. }
            | Self::LinkFailed { path, .. }
            | Self::SweepFailure { path, .. } => path,
            Self::CollisionExhausted { dir, .. } => dir,
            Self::MoveVerificationFailed { source_path, .. } => source_path,
        }
    }

    /// Short machine-readable label, used in JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceNotFound { .. } => "source_not_found",
            Self::SourceNotDirectory { .. } => "source_not_directory",
            Self::SourceUnreadable { .. } => "source_unreadable",
            Self::HashFailure { .. } => "hash_failure",
            Self::CollisionExhausted { .. } => "collision_exhausted",
            Self::MoveVerificationFailed { .. } => "move_verification_failed",
            Self::MoveFailed { .. } => "move_failed",
            Self::DuplicateActionFailed { .. } => "duplicate_action_failed",
            Self::LinkFailed { .. } => "link_failed",
            Self::SweepFailure { .. } => "sweep_failure",
        }
    }
}

/// Result type for organize operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_source_errors_are_fatal() {
        let missing = OrganizeError::SourceNotFound {
            path: PathBuf::from("/nope"),
        };
        let hash = OrganizeError::HashFailure {
            path: PathBuf::from("/a"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(missing.is_fatal());
        assert!(!hash.is_fatal());
    }

    #[test]
    fn test_display_names_the_path() {
        let err = OrganizeError::CollisionExhausted {
            dir: PathBuf::from("/dest/images"),
            name: "a.txt".to_string(),
            attempts: 10_000,
        };
        let message = err.to_string();
        assert!(message.contains("/dest/images"));
        assert!(message.contains("a.txt"));
        assert_eq!(err.path(), Path::new("/dest/images"));
        assert_eq!(err.kind(), "collision_exhausted");
    }
}
