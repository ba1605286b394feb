//! Policies deciding when a cached value must be recomputed.

use sha2::{Digest as _, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::CacheError;

/// Every supported digest renders as this many lowercase hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFunc {
    Blake3,
    Sha256,
}

impl HashFunc {
    /// The fast digest when this build carries it, SHA-256 otherwise.
    pub fn preferred() -> Self {
        if cfg!(feature = "blake3") {
            HashFunc::Blake3
        } else {
            HashFunc::Sha256
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "blake3" => Some(HashFunc::Blake3),
            "sha256" => Some(HashFunc::Sha256),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HashFunc::Blake3 => "blake3",
            HashFunc::Sha256 => "sha256",
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            HashFunc::Blake3 => cfg!(feature = "blake3"),
            HashFunc::Sha256 => true,
        }
    }

    /// Hash a file's contents.
    pub fn digest_file(self, path: &Path) -> io::Result<Digest> {
        let mut file = File::open(path)?;
        match self {
            HashFunc::Sha256 => {
                let mut hasher = Sha256::new();
                io::copy(&mut file, &mut hasher)?;
                Ok(Digest(hex::encode(hasher.finalize())))
            }
            #[cfg(feature = "blake3")]
            HashFunc::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                io::copy(&mut file, &mut hasher)?;
                Ok(Digest(hasher.finalize().to_hex().to_string()))
            }
            #[cfg(not(feature = "blake3"))]
            HashFunc::Blake3 => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "built without blake3 support",
            )),
        }
    }
}

impl fmt::Display for HashFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hex-encoded file digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest(String);

impl Digest {
    /// Accept exactly [`DIGEST_HEX_LEN`] hex characters.
    pub fn parse(text: &str) -> Option<Self> {
        let valid = text.len() == DIGEST_HEX_LEN && text.chars().all(|c| c.is_ascii_hexdigit());
        valid.then(|| Digest(text.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a validity check. Invalidation is expected, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RehashCondition {
    /// Fails every check. Checks are still throttled by the entry's
    /// check frequency, so this means "recompute once per interval".
    #[default]
    Always,
    Never,
    FilesChanged {
        hashes: BTreeMap<PathBuf, Digest>,
        hash_func: HashFunc,
    },
}

impl RehashCondition {
    /// Hash `paths` now with the preferred function; directories are walked.
    pub fn files_changed<I, P>(paths: I) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self::files_changed_with(paths, HashFunc::preferred())
    }

    pub fn files_changed_with<I, P>(paths: I, hash_func: HashFunc) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut hashes = BTreeMap::new();
        for path in paths {
            for file in expand_files(path.as_ref())? {
                let digest = hash_func
                    .digest_file(&file)
                    .map_err(|source| CacheError::Io {
                        path: file.clone(),
                        source,
                    })?;
                hashes.insert(file, digest);
            }
        }
        Self::from_hashes(hashes, hash_func)
    }

    /// Build from already computed digests; the set must not be empty.
    pub fn from_hashes(
        hashes: BTreeMap<PathBuf, Digest>,
        hash_func: HashFunc,
    ) -> Result<Self, CacheError> {
        if hashes.is_empty() {
            return Err(CacheError::EmptyFileSet);
        }
        Ok(RehashCondition::FilesChanged { hashes, hash_func })
    }

    /// Discriminant stored next to each entry.
    pub fn kind(&self) -> &'static str {
        match self {
            RehashCondition::Always => "always",
            RehashCondition::Never => "never",
            RehashCondition::FilesChanged { .. } => "files_changed",
        }
    }

    pub fn check(&self) -> Validity {
        match self {
            RehashCondition::Always => {
                Validity::Invalid("always rehash unconditionally invalidates".to_string())
            }
            RehashCondition::Never => Validity::Valid,
            RehashCondition::FilesChanged { hashes, hash_func } => {
                if !hash_func.is_available() {
                    return Validity::Invalid(format!("missing hash function {hash_func}"));
                }
                for (path, expected) in hashes {
                    match hash_func.digest_file(path) {
                        Ok(actual) if actual == *expected => {
                            tracing::debug!("File {} has same hash: {expected}", path.display());
                        }
                        Ok(actual) => {
                            return Validity::Invalid(format!(
                                "hash changed for file {}: {expected} => {actual}",
                                path.display()
                            ));
                        }
                        Err(err) => {
                            return Validity::Invalid(format!(
                                "cannot hash {}: {err}",
                                path.display()
                            ));
                        }
                    }
                }
                tracing::debug!("Successfully checked {} files", hashes.len());
                Validity::Valid
            }
        }
    }
}

fn expand_files(path: &Path) -> Result<Vec<PathBuf>, CacheError> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
