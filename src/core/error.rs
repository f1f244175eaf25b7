//! Error types for mpresolve
//!
//! Only failures that make a whole request meaningless end up here. Problems local to one
//! dependency (missing POM, ambiguous variant, ...) are recorded as [`Message`]s on that
//! dependency instead, see [`crate::core::context::Message`].
//!
//! [`Message`]: crate::core::context::Message

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for resolution operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Main error type for mpresolve
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Target platform is not specified")]
    NoTargetPlatform,

    #[error(
        "Dependency resolution can not be run for COMMON platform. \
         Set of actual target platforms should be specified"
    )]
    CommonPlatformOnly,

    #[error("Hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Producer reported success but {0} was not written")]
    ProducerContract(PathBuf),

    #[error("Node {node} can not be bound to {actual}: identity mismatch")]
    IdentityMismatch { node: String, actual: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("{0}")]
    Other(String),
}

impl ResolveError {
    /// Create a generic error from a string
    pub fn other<S: Into<String>>(msg: S) -> Self {
        ResolveError::Other(msg.into())
    }

    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ResolveError::Config(msg.into())
    }

    /// Create a cache error
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        ResolveError::Cache(msg.into())
    }

    /// Create a network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        ResolveError::Network(msg.into())
    }

    /// Errors that abort the whole request instead of becoming a diagnostic on one dependency
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ResolveError::NoTargetPlatform
                | ResolveError::CommonPlatformOnly
                | ResolveError::Config(_)
                | ResolveError::ProducerContract(_)
                | ResolveError::IdentityMismatch { .. }
        )
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::NoTargetPlatform | ResolveError::CommonPlatformOnly => 2,
            ResolveError::Config(_) => 2,
            ResolveError::HashMismatch { .. } => 3,
            ResolveError::ProducerContract(_) | ResolveError::IdentityMismatch { .. } => 70,
            _ => 1,
        }
    }
}
