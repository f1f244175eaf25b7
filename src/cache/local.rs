//! Local repository layouts probed before any network access

use std::fmt;
use std::path::{Path, PathBuf};

use crate::cache::hash::{read_sidecar, Hash, HashAlgorithm};
use crate::coordinates::Coordinate;
use crate::core::ResolveResult;

/// A file found in a local repository, with the hash the layout recorded for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub recorded: Option<Hash>,
}

impl LocalFile {
    /// Whether this copy can be used without downloading
    ///
    /// With an expected hash the file content must match it. Without one, the layout must have
    /// recorded a hash and the content must match that record.
    pub fn is_valid(&self, expected: Option<&Hash>) -> ResolveResult<bool> {
        match (expected, &self.recorded) {
            (Some(expected), Some(recorded)) if recorded.algorithm == expected.algorithm => {
                if !recorded.matches(expected) {
                    return Ok(false);
                }
                expected.verify_file(&self.path)
            }
            (Some(expected), _) => expected.verify_file(&self.path),
            (None, Some(recorded)) => recorded.verify_file(&self.path),
            (None, None) => Ok(false),
        }
    }
}

/// A directory tree holding artifacts in some well-known layout
pub trait LocalRepository: fmt::Debug + Send + Sync {
    fn root(&self) -> &Path;

    /// Where a file would be stored, if the layout can tell from the coordinate alone
    fn guess_path(&self, coordinate: &Coordinate, file_name: &str) -> Option<PathBuf>;

    /// Locate an existing copy of a file
    fn find(&self, coordinate: &Coordinate, file_name: &str) -> Option<LocalFile>;
}

/// `~/.m2/repository` style layout: `root/g/r/o/u/p/module/version/file` with checksum sidecars
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenLocalRepository {
    root: PathBuf,
}

impl MavenLocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, coordinate: &Coordinate, file_name: &str) -> PathBuf {
        self.root.join(coordinate.file_path(file_name))
    }
}

impl LocalRepository for MavenLocalRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    fn guess_path(&self, coordinate: &Coordinate, file_name: &str) -> Option<PathBuf> {
        Some(self.path_of(coordinate, file_name))
    }

    fn find(&self, coordinate: &Coordinate, file_name: &str) -> Option<LocalFile> {
        let path = self.path_of(coordinate, file_name);
        if !path.is_file() {
            return None;
        }
        let recorded = read_sidecar(&path);
        Some(LocalFile { path, recorded })
    }
}

/// Gradle module cache layout: `root/group/module/version/<sha1>/file`
///
/// The directory name is the sha1 of the file, printed without leading zeros.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradleLocalRepository {
    root: PathBuf,
}

impl GradleLocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn version_dir(&self, coordinate: &Coordinate) -> PathBuf {
        self.root
            .join(&coordinate.group)
            .join(&coordinate.module)
            .join(&coordinate.version)
    }
}

impl LocalRepository for GradleLocalRepository {
    fn root(&self) -> &Path {
        &self.root
    }

    fn guess_path(&self, _coordinate: &Coordinate, _file_name: &str) -> Option<PathBuf> {
        None
    }

    fn find(&self, coordinate: &Coordinate, file_name: &str) -> Option<LocalFile> {
        let entries = std::fs::read_dir(self.version_dir(coordinate)).ok()?;
        entries.flatten().find_map(|entry| {
            let path = entry.path().join(file_name);
            if !path.is_file() {
                return None;
            }
            let dir_name = entry.file_name().to_string_lossy().to_string();
            let recorded = Hash::parse(HashAlgorithm::Sha1, &format!("{:0>40}", dir_name));
            Some(LocalFile { path, recorded })
        })
    }
}
