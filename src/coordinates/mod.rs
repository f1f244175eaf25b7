//! Maven coordinates and the identities derived from them

pub mod version;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{ResolveError, ResolveResult};

pub use version::{is_version_range, MavenVersion, VersionRequirement};

/// Version-less identity of a library, `group:module`
///
/// Conflict resolution groups nodes by this key, and the ancestry walk uses it to detect cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key {
    pub group: String,
    pub module: String,
}

impl Key {
    pub fn new(group: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            module: module.into(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.module)
    }
}

/// A `group:module:version` triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub group: String,
    pub module: String,
    pub version: String,
}

impl Coordinate {
    pub fn new(
        group: impl Into<String>,
        module: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            module: module.into(),
            version: version.into(),
        }
    }

    pub fn key(&self) -> Key {
        Key::new(self.group.clone(), self.module.clone())
    }

    pub fn has_key(&self, key: &Key) -> bool {
        self.group == key.group && self.module == key.module
    }

    /// Parsed form of the version, used for structural comparison
    pub fn maven_version(&self) -> MavenVersion {
        MavenVersion::parse(&self.version)
    }

    /// `group/with/slashes/module/version`, the directory of this coordinate in a Maven layout
    pub fn directory_path(&self) -> String {
        format!(
            "{}/{}/{}",
            self.group.replace('.', "/"),
            self.module,
            self.version
        )
    }

    /// `{module}-{version}[-{classifier}].{extension}`
    pub fn file_name(&self, classifier: Option<&str>, extension: &str) -> String {
        match classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.module, self.version, classifier, extension
            ),
            None => format!("{}-{}.{}", self.module, self.version, extension),
        }
    }

    /// Repository-relative path of one of this coordinate's files
    pub fn file_path(&self, file_name: &str) -> String {
        format!("{}/{}", self.directory_path(), file_name)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.module, self.version)
    }
}

impl FromStr for Coordinate {
    type Err = ResolveError;

    fn from_str(s: &str) -> ResolveResult<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            [group, module, version]
                if !group.is_empty() && !module.is_empty() && !version.is_empty() =>
            {
                Ok(Coordinate::new(*group, *module, *version))
            }
            _ => Err(ResolveError::config(format!(
                "Invalid coordinate '{}', expected group:module:version",
                s
            ))),
        }
    }
}
