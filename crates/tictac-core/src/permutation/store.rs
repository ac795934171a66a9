//! On-disk artifact for the permutation operator.

use super::sparse::{SparseMatrix, Triplet};
use crate::basis::{Channel, GridConfig};
use crate::domain::{JpBlock, TicTacError};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const MAGIC: &str = "TICTAC-P123";
pub const FORMAT_VERSION: u32 = 1;

/// Everything the operator depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermutationFingerprint {
    pub format_version: u32,
    pub block: JpBlock,
    pub channels: Vec<Channel>,
    pub p_grid: GridConfig,
    pub q_grid: GridConfig,
    pub angle_points: usize,
    pub drop_threshold: f64,
    pub midpoint: bool,
}

impl PermutationFingerprint {
    pub fn canonical_json(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(|source| StoreError::Fingerprint { source })
    }

    /// SHA-256 of the canonical JSON encoding, hex.
    pub fn digest(&self) -> Result<String, StoreError> {
        Ok(digest_json(&self.canonical_json()?))
    }
}

fn digest_json(json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    row: u32,
    col: u32,
    re: f64,
    im: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPermutation {
    magic: String,
    format_version: u32,
    // JSON keeps the tagged grid shape readable for the binary codec.
    fingerprint: String,
    digest: String,
    dimension: u64,
    entries: Vec<StoredEntry>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to encode fingerprint: {source}")]
    Fingerprint { source: serde_json::Error },
    #[error("failed to access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode '{}': {source}", path.display())]
    Encode {
        path: PathBuf,
        source: bincode::Error,
    },
    #[error("'{}' is not a readable permutation artifact: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: bincode::Error,
    },
    #[error("'{}' has magic '{found}' or format version {version}", path.display())]
    Format {
        path: PathBuf,
        found: String,
        version: u32,
    },
    #[error("'{}' was computed for a different configuration (digest {found})", path.display())]
    FingerprintMismatch { path: PathBuf, found: String },
    #[error("'{}' cannot store index {index} in 32 bits", path.display())]
    IndexOverflow { path: PathBuf, index: usize },
    #[error("'{}' is internally inconsistent: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl From<StoreError> for TicTacError {
    fn from(error: StoreError) -> Self {
        let message = error.to_string();
        match error {
            StoreError::Io { .. } => TicTacError::io_system("IO.P123", message),
            StoreError::Fingerprint { .. } => TicTacError::internal("SYS.P123_FINGERPRINT", message),
            StoreError::Encode { .. } | StoreError::IndexOverflow { .. } => {
                TicTacError::persistence("STORE.ENCODE", message)
            }
            StoreError::FingerprintMismatch { .. } => {
                TicTacError::persistence("STORE.FINGERPRINT", message)
            }
            StoreError::Decode { .. } | StoreError::Format { .. } | StoreError::Corrupt { .. } => {
                TicTacError::persistence("STORE.CORRUPT", message)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermutationStore {
    directory: PathBuf,
}

impl PermutationStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn path_for(&self, fingerprint: &PermutationFingerprint) -> Result<PathBuf, StoreError> {
        let digest = fingerprint.digest()?;
        Ok(self.directory.join(format!(
            "P123_{}_{}.bin",
            fingerprint.block.file_tag(),
            &digest[..16]
        )))
    }

    pub fn save(
        &self,
        fingerprint: &PermutationFingerprint,
        matrix: &SparseMatrix,
    ) -> Result<PathBuf, StoreError> {
        let path = self.path_for(fingerprint)?;
        fs::create_dir_all(&self.directory).map_err(|source| StoreError::Io {
            path: self.directory.clone(),
            source,
        })?;
        let json = fingerprint.canonical_json()?;
        let stored = StoredPermutation {
            magic: MAGIC.to_string(),
            format_version: FORMAT_VERSION,
            digest: digest_json(&json),
            fingerprint: json,
            dimension: matrix.dimension() as u64,
            entries: matrix
                .triplets()
                .map(|triplet| stored_entry(triplet, &path))
                .collect::<Result<_, _>>()?,
        };
        let bytes = bincode::serialize(&stored).map_err(|source| StoreError::Encode {
            path: path.clone(),
            source,
        })?;
        let io_error = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        // Readers only ever see a complete artifact.
        let mut staged = tempfile::NamedTempFile::new_in(&self.directory).map_err(io_error)?;
        staged.write_all(&bytes).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        staged
            .persist(&path)
            .map_err(|error| io_error(error.error))?;
        Ok(path)
    }

    /// `Ok(None)` when no artifact exists for this fingerprint.
    pub fn load(
        &self,
        fingerprint: &PermutationFingerprint,
    ) -> Result<Option<SparseMatrix>, StoreError> {
        let path = self.path_for(fingerprint)?;
        if !path.is_file() {
            return Ok(None);
        }
        read_artifact(&path, fingerprint).map(Some)
    }
}

fn stored_entry(triplet: Triplet, path: &Path) -> Result<StoredEntry, StoreError> {
    let narrow = |index: usize| {
        u32::try_from(index).map_err(|_| StoreError::IndexOverflow {
            path: path.to_path_buf(),
            index,
        })
    };
    Ok(StoredEntry {
        row: narrow(triplet.row)?,
        col: narrow(triplet.col)?,
        re: triplet.value.re,
        im: triplet.value.im,
    })
}

pub fn read_artifact(
    path: &Path,
    expected: &PermutationFingerprint,
) -> Result<SparseMatrix, StoreError> {
    let bytes = fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let stored: StoredPermutation =
        bincode::deserialize(&bytes).map_err(|source| StoreError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    if stored.magic != MAGIC || stored.format_version != FORMAT_VERSION {
        return Err(StoreError::Format {
            path: path.to_path_buf(),
            found: stored.magic,
            version: stored.format_version,
        });
    }
    if stored.digest != digest_json(&stored.fingerprint) {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: "digest does not match the stored fingerprint".to_string(),
        });
    }
    let fingerprint: PermutationFingerprint =
        serde_json::from_str(&stored.fingerprint).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("unreadable fingerprint: {source}"),
        })?;
    if fingerprint != *expected {
        return Err(StoreError::FingerprintMismatch {
            path: path.to_path_buf(),
            found: stored.digest,
        });
    }

    let dimension = stored.dimension as usize;
    let mut triplets = Vec::with_capacity(stored.entries.len());
    for entry in stored.entries {
        let (row, col) = (entry.row as usize, entry.col as usize);
        if row >= dimension || col >= dimension {
            return Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("entry ({row}, {col}) outside dimension {dimension}"),
            });
        }
        triplets.push(Triplet {
            row,
            col,
            value: Complex64::new(entry.re, entry.im),
        });
    }
    Ok(SparseMatrix::from_triplets(dimension, triplets, 0.0))
}

#[cfg(test)]
mod tests {
    use super::{
        FORMAT_VERSION, PermutationFingerprint, PermutationStore, StoreError, stored_entry,
    };
    use crate::basis::{Channel, GridConfig};
    use crate::domain::{JpBlock, Parity};
    use crate::permutation::sparse::{SparseMatrix, Triplet};
    use num_complex::Complex64;
    use std::fs;
    use tempfile::TempDir;

    fn fingerprint(threshold: f64) -> PermutationFingerprint {
        PermutationFingerprint {
            format_version: FORMAT_VERSION,
            block: JpBlock::new(1, Parity::Even),
            channels: vec![Channel {
                l: 0,
                s: 1,
                j: 1,
                t: 0,
                lambda: 0,
                two_i: 1,
                two_j: 1,
                two_t: 1,
            }],
            p_grid: GridConfig::default(),
            q_grid: GridConfig::default(),
            angle_points: 8,
            drop_threshold: threshold,
            midpoint: false,
        }
    }

    fn matrix() -> SparseMatrix {
        SparseMatrix::from_triplets(
            3,
            vec![
                Triplet {
                    row: 0,
                    col: 2,
                    value: Complex64::new(0.25, -1.0),
                },
                Triplet {
                    row: 2,
                    col: 0,
                    value: Complex64::new(0.25, -1.0),
                },
            ],
            0.0,
        )
    }

    #[test]
    fn saved_artifact_loads_back_identically() {
        let temp = TempDir::new().expect("tempdir should be created");
        let store = PermutationStore::new(temp.path());
        let path = store.save(&fingerprint(1.0e-10), &matrix()).expect("save");
        assert!(
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("P123_JP_1_1_"))
        );
        let loaded = store.load(&fingerprint(1.0e-10)).expect("load");
        assert_eq!(loaded, Some(matrix()));
    }

    #[test]
    fn missing_artifact_is_not_an_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let store = PermutationStore::new(temp.path());
        assert_eq!(store.load(&fingerprint(1.0e-10)).expect("load"), None);
    }

    #[test]
    fn mismatched_fingerprint_is_rejected() {
        let temp = TempDir::new().expect("tempdir should be created");
        let store = PermutationStore::new(temp.path());
        let saved = store.save(&fingerprint(1.0e-10), &matrix()).expect("save");
        let other = fingerprint(1.0e-8);
        fs::copy(&saved, store.path_for(&other).expect("path")).expect("copy");
        assert!(matches!(
            store.load(&other),
            Err(StoreError::FingerprintMismatch { .. })
        ));
    }

    #[test]
    fn truncated_artifact_is_reported_corrupt() {
        let temp = TempDir::new().expect("tempdir should be created");
        let store = PermutationStore::new(temp.path());
        let path = store.save(&fingerprint(1.0e-10), &matrix()).expect("save");
        let bytes = fs::read(&path).expect("read");
        fs::write(&path, &bytes[..bytes.len() / 2]).expect("truncate");
        let error = store.load(&fingerprint(1.0e-10)).expect_err("corrupt");
        assert!(matches!(error, StoreError::Decode { .. }));
        let converted: crate::domain::TicTacError = error.into();
        assert_eq!(converted.placeholder(), "STORE.CORRUPT");
    }

    #[test]
    fn saving_replaces_a_stale_artifact_without_leftovers() {
        let temp = TempDir::new().expect("tempdir should be created");
        let store = PermutationStore::new(temp.path());
        let path = store.path_for(&fingerprint(1.0e-10)).expect("path");
        fs::write(&path, b"stale").expect("stale artifact");
        let saved = store.save(&fingerprint(1.0e-10), &matrix()).expect("save");
        assert_eq!(saved, path);
        assert_eq!(store.load(&fingerprint(1.0e-10)).expect("load"), Some(matrix()));
        let names: Vec<_> = fs::read_dir(temp.path())
            .expect("listing")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names.len(), 1, "{names:?}");
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn indices_beyond_32_bits_are_rejected() {
        let triplet = Triplet {
            row: 0,
            col: u32::MAX as usize + 1,
            value: Complex64::new(1.0, 0.0),
        };
        let error = stored_entry(triplet, std::path::Path::new("P123.bin")).expect_err("overflow");
        assert!(matches!(error, StoreError::IndexOverflow { index, .. } if index == triplet.col));
        let converted: crate::domain::TicTacError = error.into();
        assert_eq!(converted.placeholder(), "STORE.ENCODE");
    }
}
