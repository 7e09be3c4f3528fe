//! Grouping of byte-identical files.
//!
//! The index only classifies; deciding what happens to the extra copies is up
//! to the caller. A file whose digest could not be computed never lands in a
//! group, so a read error can never get a file deleted.

use crate::error::OrganizeError;
use crate::hasher::{self, HashAlgorithm};
use crate::scan::FileEntry;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// How duplicates are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupOptions {
    pub algorithm: HashAlgorithm,
    /// Only hash files whose size matches another file's size.
    pub size_prefilter: bool,
    /// Treat zero-length files as duplicates of each other.
    pub include_empty: bool,
    /// Hashing threads; 1 hashes on the calling thread.
    pub threads: usize,
}

impl Default for DedupOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            size_prefilter: true,
            include_empty: false,
            threads: 1,
        }
    }
}

/// Orders entries so the keeper comes first: fewest path segments, then the
/// smallest path compared component by component.
pub fn keeper_order(a: &FileEntry, b: &FileEntry) -> Ordering {
    a.depth()
        .cmp(&b.depth())
        .then_with(|| a.path.cmp(&b.path))
}

/// Two or more files with the same digest and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub digest: String,
    pub size: u64,
    members: Vec<FileEntry>,
}

impl DuplicateGroup {
    fn new(digest: String, size: u64, mut members: Vec<FileEntry>) -> Self {
        members.sort_by(keeper_order);
        Self {
            digest,
            size,
            members,
        }
    }

    /// The member that survives deduplication.
    pub fn keeper(&self) -> &FileEntry {
        &self.members[0]
    }

    /// Every member except the keeper.
    pub fn duplicates(&self) -> &[FileEntry] {
        &self.members[1..]
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Duplicate groups found in one set of entries.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    groups: BTreeMap<String, DuplicateGroup>,
    /// Entries that could not be hashed. They are treated as unique.
    pub hash_failures: Vec<OrganizeError>,
    /// Number of digests computed (reused digests are not counted).
    pub hashed: usize,
}

impl DuplicateIndex {
    /// Hashes the candidate entries and groups identical ones.
    ///
    /// Digests already attached to an entry are reused; new ones are attached
    /// to the entries. Never touches the filesystem beyond reading.
    pub fn build(entries: &mut [FileEntry], options: &DedupOptions) -> Self {
        let candidates = candidate_indices(entries, options);

        let to_hash: Vec<PathBuf> = candidates
            .iter()
            .filter(|&&i| entries[i].digest().is_none())
            .map(|&i| entries[i].path.clone())
            .collect();
        let mut digests = hasher::digest_many(&to_hash, options.algorithm, options.threads);

        let mut index = Self {
            hashed: to_hash.len(),
            ..Self::default()
        };

        let mut by_content: BTreeMap<(String, u64), Vec<usize>> = BTreeMap::new();
        for &i in &candidates {
            if entries[i].digest().is_none() {
                match digests.remove(&entries[i].path) {
                    Some(Ok(digest)) => entries[i].attach_digest(digest),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Excluding file from duplicate detection");
                        index.hash_failures.push(e);
                        continue;
                    }
                    None => continue,
                }
            }
            if let Some(digest) = entries[i].digest() {
                by_content
                    .entry((digest.to_string(), entries[i].size))
                    .or_default()
                    .push(i);
            }
        }

        for ((digest, size), members) in by_content {
            if members.len() < 2 {
                continue;
            }
            if index.groups.contains_key(&digest) {
                // same digest, different size: the file changed while being read
                tracing::warn!(%digest, size, "Digest seen with two sizes, ignoring second group");
                continue;
            }
            let members = members.into_iter().map(|i| entries[i].clone()).collect();
            tracing::debug!(%digest, size, "Found duplicate group");
            index
                .groups
                .insert(digest.clone(), DuplicateGroup::new(digest, size, members));
        }

        index
    }

    /// Groups keyed by digest.
    pub fn groups(&self) -> &BTreeMap<String, DuplicateGroup> {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of files that are not keepers.
    pub fn duplicate_count(&self) -> usize {
        self.groups.values().map(|g| g.len() - 1).sum()
    }

    /// Maps every non-keeper path to its group's keeper path.
    pub fn duplicate_to_keeper(&self) -> HashMap<&Path, &Path> {
        self.groups
            .values()
            .flat_map(|g| {
                let keeper = g.keeper().path.as_path();
                g.duplicates().iter().map(move |d| (d.path.as_path(), keeper))
            })
            .collect()
    }
}

fn candidate_indices(entries: &[FileEntry], options: &DedupOptions) -> Vec<usize> {
    let eligible = |e: &FileEntry| options.include_empty || e.size > 0;

    if !options.size_prefilter {
        return (0..entries.len()).filter(|&i| eligible(&entries[i])).collect();
    }

    let mut by_size: HashMap<u64, usize> = HashMap::new();
    for entry in entries.iter().filter(|e| eligible(*e)) {
        *by_size.entry(entry.size).or_insert(0) += 1;
    }
    (0..entries.len())
        .filter(|&i| {
            eligible(&entries[i]) && by_size.get(&entries[i].size).is_some_and(|&n| n > 1)
        })
        .collect()
}
