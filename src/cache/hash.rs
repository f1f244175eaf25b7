//! Artifact checksums
//!
//! Maven repositories publish `.sha512`, `.sha256` and `.sha1` siblings next to each file.
//! The same naming is used for the sidecars written next to cached files.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

use crate::core::ResolveResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashAlgorithm {
    Sha512,
    Sha256,
    Sha1,
}

impl HashAlgorithm {
    /// All supported algorithms, strongest first
    pub const STRONGEST_FIRST: [HashAlgorithm; 3] =
        [HashAlgorithm::Sha512, HashAlgorithm::Sha256, HashAlgorithm::Sha1];

    /// File extension of the checksum sibling, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha1 => "sha1",
        }
    }

    /// Path of the checksum sibling of `path`
    pub fn sidecar(self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(self.extension());
        PathBuf::from(name)
    }

    fn digest(self, reader: &mut dyn Read) -> std::io::Result<String> {
        match self {
            HashAlgorithm::Sha512 => digest_reader::<Sha512>(reader),
            HashAlgorithm::Sha256 => digest_reader::<Sha256>(reader),
            HashAlgorithm::Sha1 => digest_reader::<Sha1>(reader),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

fn digest_reader<D: Digest>(reader: &mut dyn Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// A hex-encoded checksum together with its algorithm
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

impl Hash {
    pub fn new(algorithm: HashAlgorithm, value: impl Into<String>) -> Self {
        Self {
            algorithm,
            value: value.into().trim().to_lowercase(),
        }
    }

    /// Parse the content of a checksum file. Some repositories append the file name after the
    /// hash, so only the first token is used.
    pub fn parse(algorithm: HashAlgorithm, text: &str) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let expected_len = match algorithm {
            HashAlgorithm::Sha512 => 128,
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha1 => 40,
        };
        if token.len() == expected_len && token.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self::new(algorithm, token))
        } else {
            None
        }
    }

    pub fn of_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let mut reader = data;
        // Reading from a slice cannot fail
        let value = algorithm.digest(&mut reader).unwrap_or_default();
        Self::new(algorithm, value)
    }

    pub fn of_file(algorithm: HashAlgorithm, path: &Path) -> ResolveResult<Self> {
        let mut file = std::fs::File::open(path)?;
        Ok(Self::new(algorithm, algorithm.digest(&mut file)?))
    }

    pub fn matches(&self, other: &Hash) -> bool {
        self.algorithm == other.algorithm && self.value.eq_ignore_ascii_case(&other.value)
    }

    /// Whether the file at `path` has this hash
    pub fn verify_file(&self, path: &Path) -> ResolveResult<bool> {
        Ok(self.matches(&Hash::of_file(self.algorithm, path)?))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

/// Read the strongest checksum sidecar present next to `path`
pub fn read_sidecar(path: &Path) -> Option<Hash> {
    HashAlgorithm::STRONGEST_FIRST.iter().find_map(|algorithm| {
        let text = std::fs::read_to_string(algorithm.sidecar(path)).ok()?;
        Hash::parse(*algorithm, &text)
    })
}

/// Write a checksum sidecar next to `path`
pub fn write_sidecar(path: &Path, hash: &Hash) -> ResolveResult<()> {
    std::fs::write(hash.algorithm.sidecar(path), &hash.value)?;
    Ok(())
}

/// Remove every checksum sidecar of `path`
pub fn clear_sidecars(path: &Path) -> ResolveResult<()> {
    for algorithm in HashAlgorithm::STRONGEST_FIRST {
        match std::fs::remove_file(algorithm.sidecar(path)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
