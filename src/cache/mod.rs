//! Content-addressed artifact cache for mpresolve
//!
//! The [`FileCache`] knows an ordered list of local repositories to probe before touching the
//! network, plus one Maven-layout root that receives every new download. Repackaged
//! multiplatform libraries live in a separate subtree keyed by coordinate and content hash.

pub mod archive;
pub mod hash;
pub mod local;
pub mod producer;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::coordinates::Coordinate;
use crate::core::{ResolveError, ResolveResult};

pub use hash::{Hash, HashAlgorithm};
pub use local::{GradleLocalRepository, LocalFile, LocalRepository, MavenLocalRepository};
pub use producer::{produce_file_with_double_lock_and_hash, Produced};

/// Run blocking file work (hashing, zip access, OS locks) off the async worker threads
pub async fn run_blocking<T, F>(work: F) -> ResolveResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ResolveResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ResolveError::cache(format!("Blocking task failed: {}", e)))?
}

/// On-disk cache configuration shared by every dependency of a resolution request
#[derive(Clone)]
pub struct FileCache {
    /// Cache root directory
    root: PathBuf,

    /// Repositories probed in order before downloading
    local_repositories: Vec<Arc<dyn LocalRepository>>,

    /// Maven-layout root receiving new downloads
    download_root: MavenLocalRepository,
}

impl FileCache {
    pub fn new(
        root: PathBuf,
        local_repositories: Vec<Arc<dyn LocalRepository>>,
        download_root: MavenLocalRepository,
    ) -> Self {
        Self {
            root,
            local_repositories,
            download_root,
        }
    }

    /// A cache confined to `root`, ignoring any user-level repository
    pub fn isolated(root: &Path) -> Self {
        let download_root = MavenLocalRepository::new(root.join("repository"));
        Self {
            root: root.to_path_buf(),
            local_repositories: vec![Arc::new(download_root.clone())],
            download_root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn local_repositories(&self) -> &[Arc<dyn LocalRepository>] {
        &self.local_repositories
    }

    pub fn download_root(&self) -> &MavenLocalRepository {
        &self.download_root
    }

    /// Where a newly downloaded file of `coordinate` is stored
    pub fn download_path(&self, coordinate: &Coordinate, file_name: &str) -> PathBuf {
        self.download_root.path_of(coordinate, file_name)
    }

    /// Local copies of a file, in probe order
    pub fn find_local(&self, coordinate: &Coordinate, file_name: &str) -> Vec<LocalFile> {
        self.local_repositories
            .iter()
            .filter_map(|repository| repository.find(coordinate, file_name))
            .collect()
    }

    /// Directory of repackaged multiplatform source-set libraries of one coordinate, keyed by
    /// the content hash of the library they were extracted from
    pub fn transformed_library_dir(&self, coordinate: &Coordinate, sha1: &str) -> PathBuf {
        self.root
            .join("kotlin")
            .join("kotlinTransformedMetadataLibraries")
            .join(&coordinate.group)
            .join(&coordinate.module)
            .join(&coordinate.version)
            .join(sha1)
    }

    /// Clear everything under the cache root
    pub fn clear(&self) -> ResolveResult<()> {
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root)?;
        }
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> ResolveResult<CacheStats> {
        let mut stats = CacheStats::default();
        if !self.root.exists() {
            return Ok(stats);
        }

        for entry in walkdir::WalkDir::new(&self.root).into_iter().flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.ends_with(".lock")
                || HashAlgorithm::STRONGEST_FIRST
                    .iter()
                    .any(|a| name.ends_with(&format!(".{}", a.extension())))
            {
                continue;
            }

            stats.total_size += entry.metadata().map(|m| m.len()).unwrap_or(0);
            if entry.path().starts_with(self.download_root.root()) {
                stats.downloaded_files += 1;
            } else {
                stats.transformed_files += 1;
            }
        }
        Ok(stats)
    }
}

impl fmt::Debug for FileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCache")
            .field("root", &self.root)
            .field("local_repositories", &self.local_repositories)
            .field("download_root", &self.download_root.root())
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct CacheStats {
    pub total_size: u64,
    pub downloaded_files: usize,
    pub transformed_files: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_guessed_download_path() {
        let cache = FileCache::isolated(Path::new("/R"));
        let coordinate = Coordinate::new("org.jetbrains.kotlin", "kotlin-test", "1.9.10");
        assert_eq!(
            cache.download_path(&coordinate, "kotlin-test-1.9.10.jar"),
            PathBuf::from("/R/repository/org/jetbrains/kotlin/kotlin-test/1.9.10/kotlin-test-1.9.10.jar")
        );
    }

    #[test]
    fn test_stats_ignore_sidecars_and_locks() {
        let dir = tempdir().unwrap();
        let cache = FileCache::isolated(dir.path());
        let coordinate = Coordinate::new("g", "m", "1");

        let jar = cache.download_path(&coordinate, "m-1.jar");
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, b"12345").unwrap();
        std::fs::write(jar.with_extension("jar.sha1"), b"x").unwrap();
        std::fs::write(jar.with_extension("jar.lock"), b"").unwrap();

        let klib_dir = cache.transformed_library_dir(&coordinate, "abc");
        std::fs::create_dir_all(&klib_dir).unwrap();
        std::fs::write(klib_dir.join("m-commonMain-1.klib"), b"123").unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.downloaded_files, 1);
        assert_eq!(stats.transformed_files, 1);
        assert_eq!(stats.total_size, 8);

        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap().downloaded_files, 0);
    }
}
