//! Resolution settings and the per-request context
//!
//! [`Settings`] are built once per resolution request and never mutated afterwards. A
//! [`Context`] couples them with the mutable, request-scoped state: the resolution cache, the
//! node arena and the repository client.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::FileCache;
use crate::core::platform::{ResolutionPlatform, ResolutionScope};
use crate::core::{ResolveError, ResolveResult};
use crate::registry::{Repository, RepositoryClient};
use crate::resolver::cache::ResolutionCache;
use crate::resolver::conflict::{ConflictResolutionStrategy, HighestVersionStrategy};
use crate::resolver::graph::NodeArena;
use crate::resolver::kmp::{IosSiblingVariantFallback, SourceSetFallback};

pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";

/// Network behaviour of the repository client
#[derive(Debug, Clone)]
pub struct NetworkSettings {
    /// Timeout of a single HTTP request
    pub timeout: Duration,
    /// Maximum concurrent requests
    pub concurrency: usize,
    /// Retry attempts for transport failures
    pub retries: u32,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            concurrency: 16,
            retries: 2,
        }
    }
}

/// Immutable configuration of one resolution request
#[derive(Clone)]
pub struct Settings {
    pub scope: ResolutionScope,
    pub platforms: BTreeSet<ResolutionPlatform>,
    pub repositories: Vec<Repository>,
    pub file_cache: FileCache,
    pub conflict_resolution_strategies: Vec<Arc<dyn ConflictResolutionStrategy>>,
    pub source_set_fallbacks: Vec<Arc<dyn SourceSetFallback>>,
    pub network: NetworkSettings,
}

impl Settings {
    pub fn builder(file_cache: FileCache) -> SettingsBuilder {
        SettingsBuilder::new(file_cache)
    }

    pub fn is_multiplatform(&self) -> bool {
        self.platforms.len() > 1
    }

    /// The one requested platform, when exactly one was requested
    pub fn single_platform(&self) -> Option<ResolutionPlatform> {
        if self.platforms.len() == 1 {
            self.platforms.iter().next().copied()
        } else {
            None
        }
    }

    /// Reject platform sets a resolution can not be run for
    pub fn validate_platforms(&self) -> ResolveResult<()> {
        validate_platforms(&self.platforms)
    }

    pub fn repositories_description(&self) -> String {
        self.repositories
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("scope", &self.scope)
            .field("platforms", &self.platforms)
            .field("repositories", &self.repositories)
            .field("file_cache", &self.file_cache)
            .field("conflict_resolution_strategies", &self.conflict_resolution_strategies)
            .field("source_set_fallbacks", &self.source_set_fallbacks)
            .field("network", &self.network)
            .finish()
    }
}

/// Builder for [`Settings`]; validation happens in [`SettingsBuilder::build`]
pub struct SettingsBuilder {
    scope: ResolutionScope,
    platforms: BTreeSet<ResolutionPlatform>,
    repositories: Vec<String>,
    file_cache: FileCache,
    conflict_resolution_strategies: Vec<Arc<dyn ConflictResolutionStrategy>>,
    source_set_fallbacks: Vec<Arc<dyn SourceSetFallback>>,
    network: NetworkSettings,
}

impl SettingsBuilder {
    pub fn new(file_cache: FileCache) -> Self {
        Self {
            scope: ResolutionScope::Compile,
            platforms: BTreeSet::from([ResolutionPlatform::Jvm]),
            repositories: vec![MAVEN_CENTRAL.to_string()],
            file_cache,
            conflict_resolution_strategies: vec![Arc::new(HighestVersionStrategy)],
            source_set_fallbacks: vec![Arc::new(IosSiblingVariantFallback)],
            network: NetworkSettings::default(),
        }
    }

    pub fn scope(mut self, scope: ResolutionScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn platforms<I: IntoIterator<Item = ResolutionPlatform>>(mut self, platforms: I) -> Self {
        self.platforms = platforms.into_iter().collect();
        self
    }

    pub fn repositories<I, S>(mut self, repositories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.repositories = repositories.into_iter().map(Into::into).collect();
        self
    }

    pub fn conflict_resolution_strategies(
        mut self,
        strategies: Vec<Arc<dyn ConflictResolutionStrategy>>,
    ) -> Self {
        self.conflict_resolution_strategies = strategies;
        self
    }

    pub fn source_set_fallbacks(mut self, fallbacks: Vec<Arc<dyn SourceSetFallback>>) -> Self {
        self.source_set_fallbacks = fallbacks;
        self
    }

    pub fn network(mut self, network: NetworkSettings) -> Self {
        self.network = network;
        self
    }

    pub fn build(self) -> ResolveResult<Settings> {
        validate_platforms(&self.platforms)?;
        if self.network.concurrency == 0 {
            return Err(ResolveError::config("network concurrency must be at least 1"));
        }

        let repositories = self
            .repositories
            .iter()
            .map(|url| Repository::parse(url))
            .collect::<ResolveResult<Vec<_>>>()?;

        Ok(Settings {
            scope: self.scope,
            platforms: self.platforms,
            repositories,
            file_cache: self.file_cache,
            conflict_resolution_strategies: self.conflict_resolution_strategies,
            source_set_fallbacks: self.source_set_fallbacks,
            network: self.network,
        })
    }
}

fn validate_platforms(platforms: &BTreeSet<ResolutionPlatform>) -> ResolveResult<()> {
    if platforms.is_empty() {
        return Err(ResolveError::NoTargetPlatform);
    }
    if platforms.len() == 1 && platforms.contains(&ResolutionPlatform::Common) {
        return Err(ResolveError::CommonPlatformOnly);
    }
    Ok(())
}

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("INFO"),
            Severity::Warning => f.write_str("WARNING"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

/// A diagnostic attached to the dependency that ran into it
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Message {
    pub text: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub extra: String,
    pub severity: Severity,
}

impl Message {
    pub fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            extra: String::new(),
            severity,
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = extra.into();
        self
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Info)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Warning)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, Severity::Error)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.text)?;
        if !self.extra.is_empty() {
            write!(f, " ({})", self.extra)?;
        }
        Ok(())
    }
}

/// Request-scoped state shared by every node and dependency of one resolution run
pub struct Context {
    pub settings: Arc<Settings>,
    pub cache: ResolutionCache,
    pub graph: NodeArena,
    pub client: RepositoryClient,
}

impl Context {
    pub fn new(settings: Settings) -> ResolveResult<Arc<Self>> {
        let client = RepositoryClient::new(&settings.network)?;
        Ok(Arc::new(Self {
            settings: Arc::new(settings),
            cache: ResolutionCache::new(),
            graph: NodeArena::new(),
            client,
        }))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("settings", &self.settings)
            .field("nodes", &self.graph.len())
            .finish()
    }
}
