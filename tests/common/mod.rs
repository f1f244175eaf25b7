//! Shared fixtures: throwaway Maven repositories on disk

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;

use mpresolve::cache::{FileCache, Hash, HashAlgorithm};
use mpresolve::{Coordinate, ResolutionPlatform, Resolver, Settings};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use zip::write::FileOptions;
use zip::ZipWriter;

pub const GRADLE_MARKER_COMMENT: &str = "<!-- do_not_remove: published-with-gradle-metadata -->";

pub struct MavenRepo {
    dir: TempDir,
}

impl MavenRepo {
    pub fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> String {
        url::Url::from_directory_path(self.dir.path())
            .unwrap()
            .to_string()
    }

    /// Write a file next to its `.sha1` sidecar and return the checksum
    pub fn publish(&self, coordinate: &str, file_name: &str, content: &[u8]) -> String {
        let coordinate: Coordinate = coordinate.parse().unwrap();
        let path = self.dir.path().join(coordinate.file_path(file_name));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();

        let sha1 = sha1_hex(content);
        std::fs::write(
            path.with_file_name(format!("{}.sha1", file_name)),
            &sha1,
        )
        .unwrap();
        sha1
    }

    pub fn publish_pom(&self, coordinate: &str, body: &str) {
        let c: Coordinate = coordinate.parse().unwrap();
        self.publish(coordinate, &c.file_name(None, "pom"), pom(coordinate, body).as_bytes());
    }

    /// POM with a plain jar artifact
    pub fn publish_library(&self, coordinate: &str, dependencies: &[(&str, &str)]) {
        let body: String = dependencies
            .iter()
            .map(|(dependency, scope)| {
                let d: Coordinate = dependency.parse().unwrap();
                format!(
                    "<dependency><groupId>{}</groupId><artifactId>{}</artifactId><version>{}</version><scope>{}</scope></dependency>",
                    d.group, d.module, d.version, scope
                )
            })
            .collect();
        self.publish_pom(coordinate, &format!("<dependencies>{}</dependencies>", body));

        let c: Coordinate = coordinate.parse().unwrap();
        self.publish(
            coordinate,
            &c.file_name(None, "jar"),
            &archive(&[("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n")]),
        );
    }

    /// POM carrying the Gradle metadata marker plus the `.module` file
    pub fn publish_module(&self, coordinate: &str, variants: Value) {
        let c: Coordinate = coordinate.parse().unwrap();
        self.publish_pom(coordinate, GRADLE_MARKER_COMMENT);

        let module = json!({
            "formatVersion": "1.1",
            "component": { "group": &c.group, "module": &c.module, "version": &c.version },
            "variants": variants,
        });
        self.publish(
            coordinate,
            &c.file_name(None, "module"),
            serde_json::to_string_pretty(&module).unwrap().as_bytes(),
        );
    }
}

pub fn pom(coordinate: &str, body: &str) -> String {
    let c: Coordinate = coordinate.parse().unwrap();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<project>\n  <modelVersion>4.0.0</modelVersion>\n  <groupId>{}</groupId>\n  <artifactId>{}</artifactId>\n  <version>{}</version>\n  {}\n</project>\n",
        c.group, c.module, c.version, body
    )
}

pub fn sha1_hex(content: &[u8]) -> String {
    Hash::of_bytes(HashAlgorithm::Sha1, content).value
}

/// A zip archive holding the given text entries
pub fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Module metadata dependency entry
pub fn dependency(coordinate: &str) -> Value {
    let c: Coordinate = coordinate.parse().unwrap();
    json!({ "group": c.group, "module": c.module, "version": { "requires": c.version } })
}

pub fn settings(
    repositories: &[String],
    cache: &TempDir,
    platforms: &[ResolutionPlatform],
) -> Settings {
    Settings::builder(FileCache::isolated(cache.path()))
        .repositories(repositories.iter().cloned())
        .platforms(platforms.iter().copied())
        .build()
        .unwrap()
}

pub fn resolver(repo: &MavenRepo, cache: &TempDir, platforms: &[ResolutionPlatform]) -> Resolver {
    Resolver::new(settings(&[repo.url()], cache, platforms)).unwrap()
}

pub fn coordinates(values: &[&str]) -> Vec<Coordinate> {
    values.iter().map(|c| c.parse().unwrap()).collect()
}

/// Diagnostics rendered one per line, for assertion messages
pub fn render_messages(resolver: &Resolver, root: mpresolve::resolver::NodeId) -> String {
    resolver
        .messages(root)
        .iter()
        .map(|d| format!("{}: {}", d.dependency, d.message))
        .collect::<Vec<_>>()
        .join("\n")
}
