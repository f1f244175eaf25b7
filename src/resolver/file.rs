//! Physical files of a dependency (POM, module metadata, jars, repackaged klibs)

use std::fmt;
use std::path::PathBuf;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::cache::{
    produce_file_with_double_lock_and_hash, run_blocking, Hash, HashAlgorithm, Produced,
};
use crate::coordinates::Coordinate;
use crate::core::{Context, Message, ResolutionLevel, ResolveResult};
use crate::metadata::module::VariantFile;
use crate::resolver::dependency::MavenDependency;

/// One artifact file of a coordinate, located lazily
///
/// The path is only ever set to a hash-valid copy: either a local file that passed
/// verification or a file promoted into the download root by the double-lock producer.
pub struct DependencyFile {
    coordinate: Coordinate,
    name: String,
    expected: Option<Hash>,
    path: RwLock<Option<PathBuf>>,
    lock: Mutex<()>,
}

impl DependencyFile {
    pub fn new(coordinate: Coordinate, name: impl Into<String>, expected: Option<Hash>) -> Self {
        Self {
            coordinate,
            name: name.into(),
            expected,
            path: RwLock::new(None),
            lock: Mutex::new(()),
        }
    }

    /// A file of a module metadata variant, with the strongest hash the metadata declares
    pub fn from_variant_file(coordinate: Coordinate, file: &VariantFile) -> Self {
        let expected = [
            (HashAlgorithm::Sha512, &file.sha512),
            (HashAlgorithm::Sha256, &file.sha256),
            (HashAlgorithm::Sha1, &file.sha1),
        ]
        .into_iter()
        .find_map(|(algorithm, value)| value.as_deref().and_then(|v| Hash::parse(algorithm, v)));
        Self::new(coordinate, &file.url, expected)
    }

    /// A file that has already been produced at `path`
    pub fn produced(coordinate: Coordinate, name: impl Into<String>, path: PathBuf) -> Self {
        let file = Self::new(coordinate, name, None);
        *file.path.write() = Some(path);
        file
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expected_hash(&self) -> Option<&Hash> {
        self.expected.as_ref()
    }

    /// Location of the verified file, once known
    pub fn path(&self) -> Option<PathBuf> {
        self.path.read().clone()
    }

    pub fn is_sources_or_javadoc(&self) -> bool {
        self.name.ends_with("-sources.jar") || self.name.ends_with("-javadoc.jar")
    }

    /// Make sure a hash-valid copy is available, downloading it when `level` permits
    ///
    /// Local repositories are probed first. Download problems are recorded on `owner`.
    pub async fn is_downloaded_or_download(
        &self,
        owner: &MavenDependency,
        context: &Context,
        level: ResolutionLevel,
    ) -> ResolveResult<bool> {
        if self.path().is_some() {
            return Ok(true);
        }

        let _guard = self.lock.lock().await;
        if self.path().is_some() {
            return Ok(true);
        }

        if let Some(path) = self.find_local(context).await? {
            tracing::debug!(file = %self, path = %path.display(), "local cache hit");
            *self.path.write() = Some(path);
            return Ok(true);
        }

        if level < ResolutionLevel::Network {
            return Ok(false);
        }

        match self.download(owner, context).await? {
            Some(path) => {
                *self.path.write() = Some(path);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Content of the file as text, when it has been located
    pub async fn read_text(&self) -> ResolveResult<Option<String>> {
        match self.path() {
            Some(path) => Ok(Some(tokio::fs::read_to_string(&path).await?)),
            None => Ok(None),
        }
    }

    async fn find_local(&self, context: &Context) -> ResolveResult<Option<PathBuf>> {
        let candidates = context
            .settings
            .file_cache
            .find_local(&self.coordinate, &self.name);
        if candidates.is_empty() {
            return Ok(None);
        }
        let expected = self.expected.clone();
        run_blocking(move || {
            for local in candidates {
                match local.is_valid(expected.as_ref()) {
                    Ok(true) => return Ok(Some(local.path)),
                    Ok(false) => {
                        tracing::debug!(path = %local.path.display(), "local copy failed verification")
                    }
                    Err(e) => {
                        tracing::debug!(path = %local.path.display(), "unreadable local copy: {}", e)
                    }
                }
            }
            Ok(None)
        })
        .await
    }

    async fn download(
        &self,
        owner: &MavenDependency,
        context: &Context,
    ) -> ResolveResult<Option<PathBuf>> {
        let target = context
            .settings
            .file_cache
            .download_path(&self.coordinate, &self.name);
        let remote_path = self.coordinate.file_path(&self.name);
        let repositories = owner.repositories(&context.settings);

        let produced = produce_file_with_double_lock_and_hash(&target, |temp| async move {
            for repository in &repositories {
                let bytes = match context.client.fetch(repository, &remote_path).await {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => continue,
                    Err(e) => {
                        owner.report(
                            Message::warning(format!(
                                "Failed to download {} from {}",
                                self.name, repository
                            ))
                            .with_extra(e.to_string()),
                        );
                        continue;
                    }
                };

                let expected = match &self.expected {
                    Some(hash) => Some(hash.clone()),
                    None => match context.client.fetch_checksum(repository, &remote_path).await {
                        Ok(hash) => hash,
                        Err(e) => {
                            tracing::debug!(file = %self, "checksum unavailable: {}", e);
                            None
                        }
                    },
                };

                match &expected {
                    Some(expected) => {
                        let actual = Hash::of_bytes(expected.algorithm, &bytes);
                        if !expected.matches(&actual) {
                            owner.report(
                                Message::error(format!(
                                    "Hash mismatch for {} downloaded from {}",
                                    self.name, repository
                                ))
                                .with_extra(format!("expected {}, got {}", expected, actual)),
                            );
                            continue;
                        }
                    }
                    None => owner.report(Message::warning(format!(
                        "No checksum published for {} in {}",
                        self.name, repository
                    ))),
                }

                tokio::fs::write(&temp, &bytes).await?;
                owner.set_repository(repository);
                tracing::debug!(file = %self, %repository, "downloaded");
                return Ok(Produced::Written { expected });
            }
            Ok(Produced::Declined)
        })
        .await?;

        Ok(produced.map(|_| target))
    }
}

impl fmt::Display for DependencyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.coordinate, self.name)
    }
}

impl fmt::Debug for DependencyFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyFile")
            .field("coordinate", &self.coordinate)
            .field("name", &self.name)
            .field("expected", &self.expected)
            .field("path", &self.path())
            .finish()
    }
}
