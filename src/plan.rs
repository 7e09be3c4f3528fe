//! Relocation plans.
//!
//! A plan lists every move and duplicate action of a pass before anything on
//! disk changes. Destinations are unique within the plan and free on disk at
//! the moment the plan is built.

use crate::category::{CategoryTable, NO_EXTENSION, sniff_extension};
use crate::duplicates::DuplicateIndex;
use crate::error::OrganizeError;
use crate::relocator::{free_destination, path_taken};
use crate::scan::FileEntry;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

const MIB: u64 = 1024 * 1024;

/// How files are distributed below the destination root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Layout {
    /// `<dest>/<category>/`
    #[default]
    Category,
    /// `<dest>/<formatted modification date>/`
    ModifiedDate { format: String },
    /// `<dest>/small|medium|large/`, bounds inclusive, in bytes.
    Size { small_max: u64, medium_max: u64 },
}

impl Layout {
    /// A date layout, rejecting formats `chrono` cannot render and formats
    /// whose folders would not be below the destination root. Nested folders
    /// such as `%Y/%m` are fine.
    pub fn modified_date(format: &str) -> Result<Self, String> {
        let invalid = StrftimeItems::new(format).any(|item| matches!(item, Item::Error));
        if invalid || format.trim().is_empty() {
            return Err(format!("invalid date format '{}'", format));
        }
        let sample = Local::now().format(format).to_string();
        if !stays_below_root(&sample) {
            return Err(format!(
                "date format '{}' renders as '{}', which leaves the destination",
                format, sample
            ));
        }
        Ok(Layout::ModifiedDate {
            format: format.to_string(),
        })
    }

    /// A size layout from limits in MiB.
    pub fn size_mib(small: u64, medium: u64) -> Self {
        Layout::Size {
            small_max: small.saturating_mul(MIB),
            medium_max: medium.saturating_mul(MIB),
        }
    }

    /// Sub-directory name for an entry.
    pub fn bucket(&self, entry: &FileEntry, table: &CategoryTable, sniff_content: bool) -> String {
        match self {
            Layout::Category => {
                let category = table.classify_path(&entry.path);
                if sniff_content
                    && category == NO_EXTENSION
                    && let Some(ext) = sniff_extension(&entry.path)
                {
                    return table.classify(Some(ext)).to_string();
                }
                category.to_string()
            }
            Layout::ModifiedDate { format } => {
                let modified: DateTime<Local> = entry.modified.into();
                modified.format(format).to_string()
            }
            Layout::Size {
                small_max,
                medium_max,
            } => {
                if entry.size <= *small_max {
                    "small".to_string()
                } else if entry.size <= *medium_max {
                    "medium".to_string()
                } else {
                    "large".to_string()
                }
            }
        }
    }
}

/// True when `bucket` names a directory strictly below the root it is joined to.
fn stays_below_root(bucket: &str) -> bool {
    let path = Path::new(bucket);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// What to do with the non-keeper members of a duplicate group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Report groups only; every file is moved as usual.
    #[default]
    Keep,
    /// Delete duplicates; only keepers are moved.
    Delete,
    /// Replace duplicates in place with hard links to their keeper.
    HardLink,
}

/// One `(source, destination)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bucket: String,
}

impl fmt::Display for PlannedMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source.display(), self.destination.display())
    }
}

/// Removal or linking of one duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateAction {
    pub duplicate: PathBuf,
    pub keeper: PathBuf,
    pub policy: DuplicatePolicy,
}

/// Everything a pass intends to do.
#[derive(Debug, Default)]
pub struct RelocationPlan {
    /// Moves, in source path order.
    pub moves: Vec<PlannedMove>,
    /// Duplicate actions, in duplicate path order.
    pub duplicate_actions: Vec<DuplicateAction>,
    /// Files whose destination directory is the one they are already in.
    pub already_in_place: Vec<PathBuf>,
    /// Files no destination name could be found for.
    pub failures: Vec<OrganizeError>,
}

impl RelocationPlan {
    /// Plain `(source, destination)` pairs.
    pub fn pairs(&self) -> Vec<(&Path, &Path)> {
        self.moves
            .iter()
            .map(|m| (m.source.as_path(), m.destination.as_path()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.duplicate_actions.is_empty()
    }
}

/// Builds plans for one destination root.
#[derive(Debug, Clone, Copy)]
pub struct Planner<'a> {
    pub table: &'a CategoryTable,
    pub layout: &'a Layout,
    pub destination_root: &'a Path,
    pub policy: DuplicatePolicy,
    pub sniff_content: bool,
}

impl Planner<'_> {
    /// Builds the plan. Reads the filesystem only to look for free names.
    pub fn build(&self, entries: &[FileEntry], duplicates: Option<&DuplicateIndex>) -> RelocationPlan {
        let losers = match (duplicates, self.policy) {
            (Some(index), DuplicatePolicy::Delete | DuplicatePolicy::HardLink) => {
                index.duplicate_to_keeper()
            }
            _ => Default::default(),
        };

        let mut plan = RelocationPlan::default();
        let mut reserved: HashSet<PathBuf> = HashSet::new();

        for entry in entries {
            if let Some(keeper) = losers.get(entry.path.as_path()) {
                plan.duplicate_actions.push(DuplicateAction {
                    duplicate: entry.path.clone(),
                    keeper: keeper.to_path_buf(),
                    policy: self.policy,
                });
                continue;
            }

            let bucket = self.layout.bucket(entry, self.table, self.sniff_content);
            if !stays_below_root(&bucket) {
                let e = OrganizeError::MoveFailed {
                    path: entry.path.clone(),
                    source: io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("bucket '{}' is outside the destination", bucket),
                    ),
                };
                tracing::warn!(error = %e, "Refusing to plan move");
                plan.failures.push(e);
                continue;
            }
            let dest_dir = self.destination_root.join(&bucket);
            if entry.path.parent() == Some(dest_dir.as_path()) {
                plan.already_in_place.push(entry.path.clone());
                continue;
            }

            let Some(file_name) = entry.path.file_name() else {
                continue;
            };
            match free_destination(&dest_dir, file_name, |p| {
                reserved.contains(p) || path_taken(p)
            }) {
                Ok(destination) => {
                    reserved.insert(destination.clone());
                    plan.moves.push(PlannedMove {
                        source: entry.path.clone(),
                        destination,
                        bucket,
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "No destination available");
                    plan.failures.push(e);
                }
            }
        }

        plan
    }
}
