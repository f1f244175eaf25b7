//! Repository HTTP client

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::cache::{Hash, HashAlgorithm};
use crate::core::context::NetworkSettings;
use crate::core::{ResolveError, ResolveResult};
use crate::registry::Repository;

/// Client for Maven repositories, bounded by a request semaphore
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    /// HTTP client
    client: reqwest::Client,
    /// Caps concurrent requests
    permits: Arc<Semaphore>,
    /// Retry attempts for transport failures and server errors
    retries: u32,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new(settings: &NetworkSettings) -> ResolveResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(concat!(
                "mpresolve/",
                env!("CARGO_PKG_VERSION")
            )),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| ResolveError::Network(e.to_string()))?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(settings.concurrency.max(1))),
            retries: settings.retries,
        })
    }

    /// Fetch a repository-relative path. `Ok(None)` means the repository does not have it.
    pub async fn fetch(&self, repository: &Repository, path: &str) -> ResolveResult<Option<Vec<u8>>> {
        let url = repository.resolve(path)?;

        if repository.is_local() {
            let file = url
                .to_file_path()
                .map_err(|_| ResolveError::network(format!("Invalid file URL {}", url)))?;
            return match tokio::fs::read(&file).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            };
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ResolveError::network(e.to_string()))?;

        let mut attempt = 0;
        loop {
            tracing::debug!(%url, attempt, "GET");
            let outcome = match self.client.get(url.clone()).send().await {
                Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => {
                    return Ok(None);
                }
                Ok(response) if response.status().is_success() => match response.bytes().await {
                    Ok(bytes) => return Ok(Some(bytes.to_vec())),
                    Err(e) => ResolveError::Network(format!("Failed to read {}: {}", url, e)),
                },
                Ok(response) if response.status().is_server_error() => {
                    ResolveError::Network(format!("Failed to fetch {}: HTTP {}", url, response.status()))
                }
                Ok(response) => {
                    // Other client errors (401, 403, ...) mean this repository won't serve it
                    tracing::debug!(%url, status = %response.status(), "not served");
                    return Ok(None);
                }
                Err(e) => ResolveError::Network(format!("Failed to fetch {}: {}", url, e)),
            };

            if attempt >= self.retries {
                return Err(outcome);
            }
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(100 * 2u64.pow(attempt))).await;
        }
    }

    /// Published checksum of a repository file, strongest algorithm first
    pub async fn fetch_checksum(
        &self,
        repository: &Repository,
        path: &str,
    ) -> ResolveResult<Option<Hash>> {
        for algorithm in HashAlgorithm::STRONGEST_FIRST {
            let checksum_path = format!("{}.{}", path, algorithm.extension());
            if let Some(bytes) = self.fetch(repository, &checksum_path).await? {
                if let Some(hash) = Hash::parse(algorithm, &String::from_utf8_lossy(&bytes)) {
                    return Ok(Some(hash));
                }
                tracing::debug!(path = %checksum_path, "ignoring malformed checksum");
            }
        }
        Ok(None)
    }
}
