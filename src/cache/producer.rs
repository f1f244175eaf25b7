//! Double-locked, hash-verified production of cache files
//!
//! Every file that lands in the cache (downloaded or repackaged) goes through
//! [`produce_file_with_double_lock_and_hash`]. An in-process async lock keyed by target path
//! serializes tasks of this process, an exclusive OS lock on `{target}.lock` serializes
//! processes. The producer writes into a private temp directory next to the target; the
//! result is hashed, a checksum sidecar is written, and the file is renamed into place.
//! Readers therefore never see a partially written target.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use fs2::FileExt;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;

use crate::cache::hash::{clear_sidecars, read_sidecar, write_sidecar, Hash, HashAlgorithm};
use crate::cache::run_blocking;
use crate::core::{ResolveError, ResolveResult};

// Entries live only while some task holds or waits for the lock of their path
static IN_PROCESS_LOCKS: Lazy<DashMap<PathBuf, Arc<Mutex<()>>>> = Lazy::new(DashMap::new);

/// What a producer did with the temp path it was given
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Produced {
    /// Nothing was written; the target stays absent
    Declined,
    /// The temp file was written. `expected` is checked against its content when given.
    Written { expected: Option<Hash> },
}

/// Hash of an existing target whose sidecar matches its content
pub async fn verified_target(target: &Path) -> ResolveResult<Option<Hash>> {
    if !target.is_file() {
        return Ok(None);
    }
    let target = target.to_path_buf();
    run_blocking(move || match read_sidecar(&target) {
        Some(hash) if hash.verify_file(&target)? => Ok(Some(hash)),
        _ => Ok(None),
    })
    .await
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

async fn lock_file_exclusive(path: PathBuf) -> ResolveResult<File> {
    run_blocking(move || {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()?;
        Ok(file)
    })
    .await
}

/// Produce `target` at most once across tasks and processes
///
/// Returns the hash of the target when it exists afterwards, `None` when the producer
/// declined. A target that already exists with a matching sidecar is returned without
/// invoking the producer.
pub async fn produce_file_with_double_lock_and_hash<F, Fut>(
    target: &Path,
    producer: F,
) -> ResolveResult<Option<Hash>>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = ResolveResult<Produced>>,
{
    if let Some(hash) = verified_target(target).await? {
        return Ok(Some(hash));
    }

    let in_process = IN_PROCESS_LOCKS
        .entry(target.to_path_buf())
        .or_default()
        .clone();
    let result = {
        let _guard = in_process.lock().await;
        produce_in_process_locked(target, producer).await
    };
    drop(in_process);
    IN_PROCESS_LOCKS.remove_if(target, |_, lock| Arc::strong_count(lock) == 1);
    result
}

async fn produce_in_process_locked<F, Fut>(
    target: &Path,
    producer: F,
) -> ResolveResult<Option<Hash>>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = ResolveResult<Produced>>,
{
    if let Some(hash) = verified_target(target).await? {
        tracing::debug!(target = %target.display(), "produced by another task");
        return Ok(Some(hash));
    }

    let parent = target
        .parent()
        .ok_or_else(|| ResolveError::cache(format!("{} has no parent", target.display())))?;
    std::fs::create_dir_all(parent)?;

    let lock_file = lock_file_exclusive(lock_path(target)).await?;
    let result = produce_locked(target, parent, producer).await;
    if let Err(e) = FileExt::unlock(&lock_file) {
        tracing::warn!(target = %target.display(), "failed to release file lock: {}", e);
    }
    result
}

async fn produce_locked<F, Fut>(
    target: &Path,
    parent: &Path,
    producer: F,
) -> ResolveResult<Option<Hash>>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = ResolveResult<Produced>>,
{
    if let Some(hash) = verified_target(target).await? {
        tracing::debug!(target = %target.display(), "produced by another process");
        return Ok(Some(hash));
    }

    let file_name = target
        .file_name()
        .ok_or_else(|| ResolveError::cache(format!("{} has no file name", target.display())))?;
    let temp_dir = tempfile::Builder::new()
        .prefix(".produce-")
        .tempdir_in(parent)?;
    let temp_path = temp_dir.path().join(file_name);

    tracing::debug!(target = %target.display(), "producing");
    let expected = match producer(temp_path.clone()).await? {
        Produced::Declined => return Ok(None),
        Produced::Written { expected } => expected,
    };

    if !temp_path.is_file() {
        return Err(ResolveError::ProducerContract(target.to_path_buf()));
    }

    let algorithm = expected
        .as_ref()
        .map_or(HashAlgorithm::Sha1, |hash| hash.algorithm);
    let actual = {
        let temp_path = temp_path.clone();
        run_blocking(move || Hash::of_file(algorithm, &temp_path)).await?
    };
    if let Some(expected) = expected {
        if !expected.matches(&actual) {
            return Err(ResolveError::HashMismatch {
                path: target.to_path_buf(),
                expected: expected.value,
                actual: actual.value,
            });
        }
    }

    clear_sidecars(target)?;
    write_sidecar(target, &actual)?;
    std::fs::rename(&temp_path, target)?;
    Ok(Some(actual))
}
