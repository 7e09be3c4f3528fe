//! Streaming content digests.
//!
//! Files are read in fixed 64 KiB chunks so memory stays flat regardless of
//! file size.

use crate::error::{OrganizeError, OrganizeResult};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Read buffer size for hashing.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256, the default.
    #[default]
    Sha256,
    /// MD5, faster but only for non-adversarial input.
    Md5,
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Md5 => write!(f, "md5"),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(HashAlgorithm::Sha256),
            "md5" => Ok(HashAlgorithm::Md5),
            other => Err(format!("unknown hash algorithm '{}'", other)),
        }
    }
}

/// Computes the lowercase hex digest of a file's content.
///
/// # Errors
///
/// Returns `OrganizeError::HashFailure` when the file cannot be opened or a
/// read fails part way through.
pub fn digest(path: &Path, algorithm: HashAlgorithm) -> OrganizeResult<String> {
    let result = match algorithm {
        HashAlgorithm::Sha256 => stream_digest::<Sha256>(path),
        HashAlgorithm::Md5 => stream_digest::<md5::Md5>(path),
    };
    result.map_err(|source| OrganizeError::HashFailure {
        path: path.to_path_buf(),
        source,
    })
}

fn stream_digest<D: Digest>(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hashes many files, optionally on a bounded thread pool.
///
/// Hashing is read-only, so it is the one phase allowed to run in parallel.
/// With `threads <= 1` files are hashed one after another on the calling
/// thread. Results are keyed by path; each value carries its own error.
pub fn digest_many(
    paths: &[PathBuf],
    algorithm: HashAlgorithm,
    threads: usize,
) -> HashMap<PathBuf, OrganizeResult<String>> {
    if threads <= 1 || paths.len() < 2 {
        return paths
            .iter()
            .map(|p| (p.clone(), digest(p, algorithm)))
            .collect();
    }

    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(|| {
            paths
                .par_iter()
                .map(|p| (p.clone(), digest(p, algorithm)))
                .collect()
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Could not start hashing pool, hashing sequentially");
            paths
                .iter()
                .map(|p| (p.clone(), digest(p, algorithm)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sha256_known_value() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("abc.txt");
        fs::write(&path, "abc").expect("Failed to write test file");

        let hex = digest(&path, HashAlgorithm::Sha256).expect("Failed to hash");
        assert_eq!(
            hex,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_md5_known_value() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("abc.txt");
        fs::write(&path, "abc").expect("Failed to write test file");

        let hex = digest(&path, HashAlgorithm::Md5).expect("Failed to hash");
        assert_eq!(hex, "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_multi_chunk_file_matches_single_update() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("big.bin");
        let content: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &content).expect("Failed to write test file");

        let expected = hex::encode(Sha256::digest(&content));
        assert_eq!(
            digest(&path, HashAlgorithm::Sha256).expect("Failed to hash"),
            expected
        );
    }

    #[test]
    fn test_missing_file_is_hash_failure() {
        let result = digest(Path::new("/definitely/not/here.bin"), HashAlgorithm::Sha256);
        assert!(matches!(result, Err(OrganizeError::HashFailure { .. })));
    }

    #[test]
    fn test_digest_many_parallel_matches_sequential() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let paths: Vec<PathBuf> = (0..8)
            .map(|i| {
                let p = temp_dir.path().join(format!("f{}.txt", i));
                fs::write(&p, format!("content {}", i % 3)).expect("Failed to write test file");
                p
            })
            .collect();

        let sequential = digest_many(&paths, HashAlgorithm::Sha256, 1);
        let parallel = digest_many(&paths, HashAlgorithm::Sha256, 4);

        for path in &paths {
            assert_eq!(
                sequential[path].as_ref().expect("sequential hash"),
                parallel[path].as_ref().expect("parallel hash")
            );
        }
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("SHA-256".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Sha256));
        assert_eq!("md5".parse::<HashAlgorithm>(), Ok(HashAlgorithm::Md5));
        assert!("crc32".parse::<HashAlgorithm>().is_err());
    }
}
