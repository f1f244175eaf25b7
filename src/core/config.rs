//! Configuration handling for mpresolve
//!
//! Supports mpresolve.toml, .mpresolverc, and environment variable overrides. The loaded
//! [`Config`] is only a source for the immutable [`Settings`] the resolver consumes.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::cache::{FileCache, GradleLocalRepository, LocalRepository, MavenLocalRepository};
use crate::core::context::{NetworkSettings, Settings, MAVEN_CENTRAL};
use crate::core::platform::{ResolutionPlatform, ResolutionScope};
use crate::core::{ResolveError, ResolveResult};
use crate::resolver::conflict::{
    ConflictResolutionStrategy, HighestVersionStrategy, PinnedVersionStrategy,
};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Remote repositories
    pub repositories: RepositoryConfig,

    /// Cache configuration
    pub cache: CacheConfig,

    /// Resolution defaults
    pub resolution: ResolutionConfig,

    /// Network configuration
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository URLs, tried in order
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory (downloads and repackaged libraries)
    pub dir: Option<PathBuf>,

    /// Never touch the network
    pub offline: bool,

    /// Probe ~/.m2/repository before downloading
    pub maven_local: bool,

    /// Probe the Gradle module cache before downloading
    pub gradle_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// Resolution scope
    pub scope: ResolutionScope,

    /// Target platforms
    pub platforms: Vec<String>,

    /// Versions forced per `group:module`
    #[serde(default)]
    pub pins: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Request timeout in seconds
    pub timeout: u64,

    /// Maximum concurrent requests
    pub concurrency: usize,

    /// Retry attempts for failed requests
    pub retries: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            urls: vec![MAVEN_CENTRAL.to_string()],
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            offline: false,
            maven_local: true,
            gradle_cache: true,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            scope: ResolutionScope::Compile,
            platforms: vec!["jvm".to_string()],
            pins: HashMap::new(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            concurrency: 16,
            retries: 2,
        }
    }
}

/// One configuration file as written: every field is optional so that a file only overrides
/// what it mentions
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    repositories: Option<RepositoryLayer>,
    cache: Option<CacheLayer>,
    resolution: Option<ResolutionLayer>,
    network: Option<NetworkLayer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RepositoryLayer {
    urls: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CacheLayer {
    dir: Option<PathBuf>,
    offline: Option<bool>,
    maven_local: Option<bool>,
    gradle_cache: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResolutionLayer {
    scope: Option<ResolutionScope>,
    platforms: Option<Vec<String>>,
    pins: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NetworkLayer {
    timeout: Option<u64>,
    concurrency: Option<usize>,
    retries: Option<u32>,
}

impl Config {
    /// Load configuration from project directory and merge with defaults
    pub fn load(project_dir: &Path) -> ResolveResult<Self> {
        let mut config = Config::default();

        let toml_path = project_dir.join("mpresolve.toml");
        if toml_path.exists() {
            let content = std::fs::read_to_string(&toml_path)?;
            let layer: ConfigLayer = toml::from_str(&content)?;
            config = config.merge(layer);
        }

        // .mpresolverc is JSON
        let rc_path = project_dir.join(".mpresolverc");
        if rc_path.exists() {
            let content = std::fs::read_to_string(&rc_path)?;
            let layer: ConfigLayer = serde_json::from_str(&content)?;
            config = config.merge(layer);
        }

        config = config.apply_env_overrides();

        tracing::debug!(?config, "loaded configuration");
        Ok(config)
    }

    /// Merge a configuration layer into this one; only the fields the layer sets win
    fn merge(mut self, layer: ConfigLayer) -> Self {
        if let Some(repositories) = layer.repositories {
            if let Some(urls) = repositories.urls {
                self.repositories.urls = urls;
            }
        }

        if let Some(cache) = layer.cache {
            self.cache.dir = cache.dir.or(self.cache.dir);
            self.cache.offline = cache.offline.unwrap_or(self.cache.offline);
            self.cache.maven_local = cache.maven_local.unwrap_or(self.cache.maven_local);
            self.cache.gradle_cache = cache.gradle_cache.unwrap_or(self.cache.gradle_cache);
        }

        if let Some(resolution) = layer.resolution {
            self.resolution.scope = resolution.scope.unwrap_or(self.resolution.scope);
            if let Some(platforms) = resolution.platforms {
                self.resolution.platforms = platforms;
            }
            self.resolution.pins.extend(resolution.pins);
        }

        if let Some(network) = layer.network {
            self.network.timeout = network.timeout.unwrap_or(self.network.timeout);
            self.network.concurrency = network.concurrency.unwrap_or(self.network.concurrency);
            self.network.retries = network.retries.unwrap_or(self.network.retries);
        }

        self
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(repositories) = env::var("MPRESOLVE_REPOSITORIES") {
            let urls: Vec<String> = repositories
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !urls.is_empty() {
                self.repositories.urls = urls;
            }
        }

        if let Ok(cache_dir) = env::var("MPRESOLVE_CACHE_DIR") {
            self.cache.dir = Some(PathBuf::from(cache_dir));
        }

        if let Ok(offline) = env::var("MPRESOLVE_OFFLINE") {
            self.cache.offline = offline == "1" || offline.to_lowercase() == "true";
        }

        if let Ok(concurrency) = env::var("MPRESOLVE_CONCURRENCY") {
            if let Ok(n) = concurrency.parse() {
                self.network.concurrency = n;
            }
        }

        if let Ok(timeout) = env::var("MPRESOLVE_TIMEOUT") {
            if let Ok(n) = timeout.parse() {
                self.network.timeout = n;
            }
        }

        self
    }

    /// Get the cache directory, creating it if necessary
    pub fn cache_dir(&self) -> ResolveResult<PathBuf> {
        if let Some(ref dir) = self.cache.dir {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        let project_dirs = ProjectDirs::from("org", "mpresolve", "mpresolve")
            .ok_or_else(|| ResolveError::config("Could not determine cache directory"))?;

        let cache_dir = project_dirs.cache_dir().to_path_buf();
        std::fs::create_dir_all(&cache_dir)?;
        Ok(cache_dir)
    }

    /// Build the file cache: the download root first, then the optional user-level caches
    pub fn file_cache(&self) -> ResolveResult<FileCache> {
        let cache_dir = self.cache_dir()?;
        let download_root = MavenLocalRepository::new(cache_dir.join("repository"));

        let mut local: Vec<Arc<dyn LocalRepository>> = vec![Arc::new(download_root.clone())];
        if let Some(home) = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()) {
            if self.cache.gradle_cache {
                local.push(Arc::new(GradleLocalRepository::new(
                    home.join(".gradle/caches/modules-2/files-2.1"),
                )));
            }
            if self.cache.maven_local {
                local.push(Arc::new(MavenLocalRepository::new(home.join(".m2/repository"))));
            }
        }

        Ok(FileCache::new(cache_dir, local, download_root))
    }

    pub fn platforms(&self) -> ResolveResult<Vec<ResolutionPlatform>> {
        self.resolution.platforms.iter().map(|p| p.parse()).collect()
    }

    /// Turn this configuration into immutable resolution settings
    pub fn settings(&self) -> ResolveResult<Settings> {
        let mut strategies: Vec<Arc<dyn ConflictResolutionStrategy>> =
            vec![Arc::new(HighestVersionStrategy)];
        if !self.resolution.pins.is_empty() {
            strategies.push(Arc::new(PinnedVersionStrategy::new(
                self.resolution.pins.clone(),
            )));
        }

        Settings::builder(self.file_cache()?)
            .scope(self.resolution.scope)
            .platforms(self.platforms()?)
            .repositories(self.repositories.urls.clone())
            .conflict_resolution_strategies(strategies)
            .network(NetworkSettings {
                timeout: Duration::from_secs(self.network.timeout),
                concurrency: self.network.concurrency,
                retries: self.network.retries,
            })
            .build()
    }

    /// Save configuration to mpresolve.toml
    pub fn save(&self, project_dir: &Path) -> ResolveResult<()> {
        let toml_path = project_dir.join("mpresolve.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(toml_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.repositories.urls, vec![MAVEN_CENTRAL.to_string()]);
        assert_eq!(config.resolution.scope, ResolutionScope::Compile);
        assert_eq!(config.platforms().unwrap(), vec![ResolutionPlatform::Jvm]);
    }

    #[test]
    fn test_load_toml() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("mpresolve.toml"),
            r#"
[resolution]
scope = "runtime"
platforms = ["iosArm64", "jvm"]

[resolution.pins]
"com.example:lib" = "2.0"

[cache]
dir = "/tmp/mpresolve-test-cache"
"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.resolution.scope, ResolutionScope::Runtime);
        assert_eq!(
            config.platforms().unwrap(),
            vec![ResolutionPlatform::IosArm64, ResolutionPlatform::Jvm]
        );
        assert_eq!(
            config.resolution.pins.get("com.example:lib").map(String::as_str),
            Some("2.0")
        );
        assert_eq!(config.cache.dir, Some(PathBuf::from("/tmp/mpresolve-test-cache")));
    }

    #[test]
    fn test_rc_overrides_only_what_it_sets() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("mpresolve.toml"),
            r#"
[cache]
maven_local = false

[resolution]
scope = "runtime"
platforms = ["iosArm64", "jvm"]

[network]
timeout = 5
"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join(".mpresolverc"),
            r#"{"network": {"retries": 5}}"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.resolution.scope, ResolutionScope::Runtime);
        assert_eq!(
            config.platforms().unwrap(),
            vec![ResolutionPlatform::IosArm64, ResolutionPlatform::Jvm]
        );
        assert!(!config.cache.maven_local);
        assert!(config.cache.gradle_cache);
        assert_eq!(config.network.retries, 5);
        assert_eq!(config.network.timeout, 5);
        assert_eq!(config.network.concurrency, 16);
    }

    #[test]
    fn test_save_roundtrip_keeps_platforms() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.resolution.platforms = vec!["linuxX64".to_string()];
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.platforms().unwrap(), vec![ResolutionPlatform::LinuxX64]);
    }
}
