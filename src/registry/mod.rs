//! Remote Maven repositories

pub mod client;

use std::fmt;

use url::Url;

use crate::core::{ResolveError, ResolveResult};

pub use client::RepositoryClient;

/// A Maven repository base URL (`https://`, `http://` or `file://`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repository {
    /// Always ends with `/`, so relative paths join below it
    url: Url,
}

impl Repository {
    pub fn parse(url: &str) -> ResolveResult<Self> {
        let mut url = Url::parse(url.trim())?;
        match url.scheme() {
            "http" | "https" | "file" => {}
            other => {
                return Err(ResolveError::config(format!(
                    "Unsupported repository scheme '{}' in {}",
                    other, url
                )))
            }
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_local(&self) -> bool {
        self.url.scheme() == "file"
    }

    /// URL of a repository-relative path such as `org/example/lib/1.0/lib-1.0.pom`
    pub fn resolve(&self, path: &str) -> ResolveResult<Url> {
        Ok(self.url.join(path.trim_start_matches('/'))?)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str().trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_keeps_base_path() {
        let repository = Repository::parse("https://repo1.maven.org/maven2").unwrap();
        assert_eq!(
            repository
                .resolve("org/jetbrains/kotlin/kotlin-test/1.9.10/kotlin-test-1.9.10.pom")
                .unwrap()
                .as_str(),
            "https://repo1.maven.org/maven2/org/jetbrains/kotlin/kotlin-test/1.9.10/kotlin-test-1.9.10.pom"
        );
        assert_eq!(repository.to_string(), "https://repo1.maven.org/maven2");
    }

    #[test]
    fn test_schemes() {
        assert!(Repository::parse("file:///tmp/repo").unwrap().is_local());
        assert!(Repository::parse("ftp://example.com/repo").is_err());
        assert!(Repository::parse("not a url").is_err());
    }
}
