mod common;

use std::fs::File;
use std::io::Read;

use common::*;
use mpresolve::{Coordinate, ResolutionLevel, ResolutionPlatform, ResolveError};
use serde_json::{json, Value};
use tempfile::tempdir;
use zip::ZipArchive;

const STRUCTURE_ENTRY: &str = "META-INF/kotlin-project-structure-metadata.json";

fn structure(variants: &[(&str, &[&str])], source_sets: Value) -> String {
    let variants: Vec<Value> = variants
        .iter()
        .map(|(name, source_sets)| json!({ "name": name, "sourceSet": source_sets }))
        .collect();
    json!({
        "projectStructure": {
            "formatVersion": "0.3.3",
            "variants": variants,
            "sourceSets": source_sets,
        }
    })
    .to_string()
}

/// The common metadata variant pointing at a published metadata jar
fn publish_metadata_variant(
    repo: &MavenRepo,
    coordinate: &str,
    entries: &[(&str, &str)],
    dependencies: Vec<Value>,
) -> (Value, String) {
    let c: Coordinate = coordinate.parse().unwrap();
    let file_name = c.file_name(Some("metadata"), "jar");
    let sha1 = repo.publish(coordinate, &file_name, &archive(entries));
    let variant = json!({
        "name": "metadataApiElements",
        "attributes": {
            "org.gradle.category": "library",
            "org.gradle.usage": "kotlin-metadata",
            "org.jetbrains.kotlin.platform.type": "common"
        },
        "dependencies": dependencies,
        "files": [ { "name": file_name, "url": file_name, "sha1": sha1 } ]
    });
    (variant, sha1)
}

fn jvm_variant(module: &str, version: &str) -> Value {
    json!({
        "name": "jvmApiElements-published",
        "attributes": {
            "org.gradle.category": "library",
            "org.gradle.usage": "java-api",
            "org.jetbrains.kotlin.platform.type": "jvm"
        },
        "available-at": {
            "url": format!("../../{m}-jvm/{v}/{m}-jvm-{v}.module", m = module, v = version),
            "group": "org.example",
            "module": format!("{}-jvm", module),
            "version": version
        }
    })
}

fn native_variant(module: &str, version: &str, variant: &str, target: &str) -> Value {
    let sibling = format!("{}-{}", module, target.replace('_', ""));
    json!({
        "name": format!("{}ApiElements-published", variant),
        "attributes": {
            "org.gradle.category": "library",
            "org.gradle.usage": "kotlin-api",
            "org.jetbrains.kotlin.platform.type": "native",
            "org.jetbrains.kotlin.native.target": target
        },
        "available-at": {
            "url": format!("../../{m}/{v}/{m}-{v}.module", m = sibling, v = version),
            "group": "org.example",
            "module": sibling,
            "version": version
        }
    })
}

fn klib_entries(path: &std::path::Path) -> Vec<(String, String)> {
    let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entries = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).unwrap();
        if entry.is_dir() {
            continue;
        }
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        entries.push((entry.name().to_string(), content));
    }
    entries.sort();
    entries
}

#[tokio::test]
async fn test_shared_source_sets_are_repackaged() {
    let repo = MavenRepo::new();

    let ui_structure = structure(
        &[
            ("jvmApiElements", &["commonMain"]),
            ("iosArm64ApiElements", &["commonMain", "iosMain"]),
        ],
        json!([
            { "name": "commonMain", "dependsOn": [], "moduleDependency": ["org.example:core"] },
            { "name": "iosMain", "dependsOn": ["commonMain"], "moduleDependency": [] }
        ]),
    );
    let (ui_metadata, ui_sha1) = publish_metadata_variant(
        &repo,
        "org.example:ui:1.0",
        &[
            (STRUCTURE_ENTRY, ui_structure.as_str()),
            ("commonMain/default/manifest", "unique_name=ui_commonMain\n"),
            ("commonMain/default/linkdata/module", "ui"),
            ("iosMain/default/manifest", "unique_name=ui_iosMain\n"),
        ],
        vec![dependency("org.example:core:1.0")],
    );
    repo.publish_module(
        "org.example:ui:1.0",
        json!([
            ui_metadata,
            jvm_variant("ui", "1.0"),
            native_variant("ui", "1.0", "iosArm64", "ios_arm64"),
        ]),
    );

    let core_structure = structure(
        &[
            ("jvmApiElements", &["commonMain"]),
            ("iosArm64ApiElements", &["commonMain"]),
        ],
        json!([{ "name": "commonMain" }]),
    );
    let (core_metadata, _) = publish_metadata_variant(
        &repo,
        "org.example:core:1.0",
        &[
            (STRUCTURE_ENTRY, core_structure.as_str()),
            ("commonMain/default/manifest", "unique_name=core_commonMain\n"),
        ],
        Vec::new(),
    );
    repo.publish_module(
        "org.example:core:1.0",
        json!([
            core_metadata,
            jvm_variant("core", "1.0"),
            native_variant("core", "1.0", "iosArm64", "ios_arm64"),
        ]),
    );

    let cache = tempdir().unwrap();
    let resolver = resolver(
        &repo,
        &cache,
        &[ResolutionPlatform::Jvm, ResolutionPlatform::IosArm64],
    );
    let root = resolver.add_roots("root", &coordinates(&["org.example:ui:1.0"]));
    resolver
        .resolve(root, ResolutionLevel::Network, true)
        .await
        .unwrap();
    assert!(!resolver.has_errors(root), "{}", render_messages(&resolver, root));
    assert_eq!(
        resolver.pretty_print(root),
        "root\n\\--- org.example:ui:1.0\n     \\--- org.example:core:1.0\n"
    );

    let mut names: Vec<String> = resolver
        .files(root, false)
        .into_iter()
        .map(|f| f.name)
        .collect();
    names.sort();
    assert_eq!(names, vec!["core-commonMain-1.0.klib", "ui-commonMain-1.0.klib"]);

    let ui = Coordinate::new("org.example", "ui", "1.0");
    let klib = resolver
        .context()
        .settings
        .file_cache
        .transformed_library_dir(&ui, &ui_sha1)
        .join("ui-commonMain-1.0.klib");
    assert!(klib.is_file());
    assert_eq!(
        klib_entries(&klib),
        vec![
            ("default/linkdata/module".to_string(), "ui".to_string()),
            ("default/manifest".to_string(), "unique_name=ui_commonMain\n".to_string()),
        ]
    );

    // Nothing is left to download for multiplatform resolutions
    resolver.download(root, ResolutionLevel::Network, false).await.unwrap();
    assert!(!resolver.has_errors(root));
}

#[tokio::test]
async fn test_ios_source_set_from_platform_metadata() {
    let repo = MavenRepo::new();

    let ui_structure = structure(
        &[
            ("iosArm64ApiElements", &["commonMain", "iosMain"]),
            ("iosX64ApiElements", &["commonMain", "iosMain"]),
        ],
        json!([
            { "name": "commonMain" },
            { "name": "iosMain", "dependsOn": ["commonMain"] }
        ]),
    );
    let (ui_metadata, _) = publish_metadata_variant(
        &repo,
        "org.example:ui:1.0",
        &[
            (STRUCTURE_ENTRY, ui_structure.as_str()),
            ("commonMain/default/manifest", "unique_name=ui_commonMain\n"),
        ],
        Vec::new(),
    );
    repo.publish_module(
        "org.example:ui:1.0",
        json!([
            ui_metadata,
            native_variant("ui", "1.0", "iosArm64", "ios_arm64"),
            native_variant("ui", "1.0", "iosX64", "ios_x64"),
        ]),
    );

    for (module, target) in [("ui-iosarm64", "ios_arm64"), ("ui-iosx64", "ios_x64")] {
        let coordinate = format!("org.example:{}:1.0", module);
        let c: Coordinate = coordinate.parse().unwrap();
        let file_name = c.file_name(Some("metadata"), "jar");
        let sha1 = repo.publish(
            &coordinate,
            &file_name,
            &archive(&[("iosMain/default/manifest", "unique_name=ui_iosMain\n")]),
        );
        repo.publish_module(
            &coordinate,
            json!([{
                "name": "iosMetadataElements-published",
                "attributes": {
                    "org.gradle.category": "library",
                    "org.gradle.usage": "kotlin-metadata",
                    "org.jetbrains.kotlin.platform.type": "native",
                    "org.jetbrains.kotlin.native.target": target
                },
                "files": [ { "name": file_name, "url": file_name, "sha1": sha1 } ]
            }]),
        );
    }

    let cache = tempdir().unwrap();
    let resolver = resolver(
        &repo,
        &cache,
        &[ResolutionPlatform::IosArm64, ResolutionPlatform::IosX64],
    );
    let root = resolver.add_roots("root", &coordinates(&["org.example:ui:1.0"]));
    resolver
        .resolve(root, ResolutionLevel::Network, true)
        .await
        .unwrap();
    assert!(!resolver.has_errors(root), "{}", render_messages(&resolver, root));

    let files = resolver.files(root, false);
    let ios = files
        .iter()
        .find(|f| f.name == "ui-iosMain-1.0.klib")
        .expect("iosMain klib");
    assert_eq!(
        klib_entries(&ios.path),
        vec![("default/manifest".to_string(), "unique_name=ui_iosMain\n".to_string())]
    );
    assert!(files.iter().any(|f| f.name == "ui-commonMain-1.0.klib"));
}

#[tokio::test]
async fn test_missing_structure_metadata_is_an_error() {
    let repo = MavenRepo::new();
    let (metadata, _) = publish_metadata_variant(
        &repo,
        "org.example:ui:1.0",
        &[("commonMain/default/manifest", "unique_name=ui_commonMain\n")],
        Vec::new(),
    );
    repo.publish_module(
        "org.example:ui:1.0",
        json!([metadata, jvm_variant("ui", "1.0")]),
    );

    let cache = tempdir().unwrap();
    let resolver = resolver(
        &repo,
        &cache,
        &[ResolutionPlatform::Jvm, ResolutionPlatform::Js],
    );
    let root = resolver.add_roots("root", &coordinates(&["org.example:ui:1.0"]));
    resolver
        .resolve(root, ResolutionLevel::Network, true)
        .await
        .unwrap();

    let messages = resolver.messages(root);
    assert_eq!(messages.len(), 1, "{}", render_messages(&resolver, root));
    assert!(messages[0].message.text.contains(STRUCTURE_ENTRY));
    assert!(resolver.files(root, false).is_empty());
}

#[test]
fn test_common_only_request_is_rejected() {
    let cache = tempdir().unwrap();
    let result = mpresolve::Settings::builder(mpresolve::cache::FileCache::isolated(cache.path()))
        .platforms([ResolutionPlatform::Common])
        .build();
    assert!(matches!(result, Err(ResolveError::CommonPlatformOnly)));

    let result = mpresolve::Settings::builder(mpresolve::cache::FileCache::isolated(cache.path()))
        .platforms(Vec::<ResolutionPlatform>::new())
        .build();
    assert!(matches!(result, Err(ResolveError::NoTargetPlatform)));
}
