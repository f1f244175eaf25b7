mod common;

use assert_cmd::Command;
use common::*;
use predicates::prelude::*;
use tempfile::tempdir;

fn mpresolve(project: &std::path::Path, cache: &std::path::Path, repo: &MavenRepo) -> Command {
    let mut cmd = Command::cargo_bin("mpresolve").unwrap();
    cmd.current_dir(project)
        .env("MPRESOLVE_CACHE_DIR", cache)
        .env("MPRESOLVE_REPOSITORIES", repo.url())
        .env_remove("MPRESOLVE_OFFLINE")
        .env_remove("RUST_LOG");
    cmd
}

fn project() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    std::fs::write(
        dir.path().join("mpresolve.toml"),
        "[cache]\nmaven_local = false\ngradle_cache = false\n",
    )
    .unwrap();
    dir
}

#[test]
fn test_resolve_prints_tree() {
    let repo = MavenRepo::new();
    repo.publish_library("org.example:app:1.0", &[("org.example:lib:1.0", "compile")]);
    repo.publish_library("org.example:lib:1.0", &[]);
    let project = project();
    let cache = tempdir().unwrap();

    mpresolve(project.path(), cache.path(), &repo)
        .args(["resolve", "org.example:app:1.0", "--download"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "root\n\\--- org.example:app:1.0\n     \\--- org.example:lib:1.0\n",
        ))
        .stdout(predicate::str::contains("Resolved 2 dependencies"));

    assert!(cache
        .path()
        .join("repository/org/example/lib/1.0/lib-1.0.jar")
        .is_file());
}

#[test]
fn test_resolve_json_reports_errors() {
    let repo = MavenRepo::new();
    let project = project();
    let cache = tempdir().unwrap();

    let output = mpresolve(project.path(), cache.path(), &repo)
        .args(["--json", "resolve", "org.example:missing:1.0"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["success"], false);
    assert_eq!(report["diagnostics"][0]["dependency"], "org.example:missing:1.0");
    assert_eq!(report["diagnostics"][0]["severity"], "ERROR");
}

#[test]
fn test_resolve_dot_format() {
    let repo = MavenRepo::new();
    repo.publish_library("org.example:app:1.0", &[]);
    let project = project();
    let cache = tempdir().unwrap();

    mpresolve(project.path(), cache.path(), &repo)
        .args(["--quiet", "resolve", "org.example:app:1.0", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    mpresolve(project.path(), cache.path(), &repo)
        .args(["resolve", "org.example:app:1.0", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("digraph"))
        .stdout(predicate::str::contains("org.example:app:1.0"));
}

#[test]
fn test_common_platform_only_is_rejected() {
    let repo = MavenRepo::new();
    let project = project();
    let cache = tempdir().unwrap();

    mpresolve(project.path(), cache.path(), &repo)
        .args(["resolve", "org.example:app:1.0", "--platform", "common"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("COMMON platform"));
}

#[test]
fn test_invalid_coordinate() {
    let repo = MavenRepo::new();
    let project = project();
    let cache = tempdir().unwrap();

    mpresolve(project.path(), cache.path(), &repo)
        .args(["resolve", "not-a-coordinate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid coordinate"));
}

#[test]
fn test_cache_path_and_clean() {
    let repo = MavenRepo::new();
    repo.publish_library("org.example:app:1.0", &[]);
    let project = project();
    let cache = tempdir().unwrap();

    mpresolve(project.path(), cache.path(), &repo)
        .args(["cache", "path", "org.example:app:1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("org/example/app/1.0"));

    mpresolve(project.path(), cache.path(), &repo)
        .args(["resolve", "org.example:app:1.0", "--download"])
        .assert()
        .success();
    assert!(cache.path().join("repository/org/example/app/1.0/app-1.0.jar").is_file());

    mpresolve(project.path(), cache.path(), &repo)
        .args(["cache", "clean"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared"));
    assert!(!cache.path().join("repository/org/example/app/1.0/app-1.0.jar").exists());
}

#[test]
fn test_offline_download_only_locates_cached_files() {
    let repo = MavenRepo::new();
    repo.publish_library("org.example:app:1.0", &[]);
    let project = project();
    let cache = tempdir().unwrap();

    // Caches the POM only
    mpresolve(project.path(), cache.path(), &repo)
        .args(["resolve", "org.example:app:1.0"])
        .assert()
        .success();

    let output = mpresolve(project.path(), cache.path(), &repo)
        .args(["--json", "resolve", "org.example:app:1.0", "--offline", "--download"])
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();

    let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(report["success"], false);
    assert_eq!(report["diagnostics"].as_array().map(Vec::len), Some(1));
    assert!(report["diagnostics"][0]["text"]
        .as_str()
        .unwrap()
        .starts_with("File was not found in the local cache"));
    assert!(!cache.path().join("repository/org/example/app/1.0/app-1.0.jar").exists());
}
