// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const NIGHTLY_SYNC: &str = r#"
apiVersion: v1
kind: Job
metadata:
  id: 00000000-0000-0000-0000-000000000001
  name: nightly-sync
  labels:
    team: platform
spec:
  schedule: "0 2 * * *"
  command: /usr/local/bin/sync.sh
  args: ["--all"]
  env:
    RUST_LOG: info
  workingDir: /var/lib/sync
"#;

fn write(root: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn parses_a_complete_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let parser = Parser::new(dir.path());
    let path = write(dir.path(), "ops/nightly-sync.yaml", NIGHTLY_SYNC);

    let job = parser.parse_file(&path).unwrap();
    assert_eq!(job.id, Uuid::from_u128(1));
    assert_eq!(job.name, "nightly-sync");
    assert_eq!(job.namespace, "ops");
    assert_eq!(job.schedule, "0 2 * * *");
    assert_eq!(job.full_command(), "/usr/local/bin/sync.sh --all");
    assert_eq!(job.env.get("RUST_LOG").map(String::as_str), Some("info"));
    assert_eq!(job.working_dir, Some(PathBuf::from("/var/lib/sync")));
    assert!(job.is_schedulable());
    assert_eq!(job.labels.get("team").map(String::as_str), Some("platform"));
}

#[test]
fn namespace_comes_from_directory_not_name() {
    let dir = tempfile::tempdir().unwrap();
    let parser = Parser::new(dir.path());

    let nested = write(dir.path(), "staging/sync.yaml", NIGHTLY_SYNC);
    assert_eq!(parser.parse_file(&nested).unwrap().namespace, "staging");

    let top_level = write(dir.path(), "sync.yaml", NIGHTLY_SYNC);
    assert_eq!(parser.parse_file(&top_level).unwrap().namespace, "default");
}

#[test]
fn paused_and_disabled_are_not_schedulable() {
    let dir = tempfile::tempdir().unwrap();
    let parser = Parser::new(dir.path());

    let paused = NIGHTLY_SYNC.replace("spec:", "spec:\n  paused: true");
    let path = write(dir.path(), "ops/paused.yaml", &paused);
    assert!(!parser.parse_file(&path).unwrap().is_schedulable());

    let disabled = NIGHTLY_SYNC.replace("spec:", "spec:\n  enabled: false");
    let path = write(dir.path(), "ops/disabled.yaml", &disabled);
    assert!(!parser.parse_file(&path).unwrap().is_schedulable());
}

#[test]
fn parse_all_skips_broken_files() {
    let dir = tempfile::tempdir().unwrap();
    let parser = Parser::new(dir.path());

    write(dir.path(), "ops/good.yaml", NIGHTLY_SYNC);
    write(dir.path(), "ops/broken.yaml", "kind: [unclosed");
    write(
        dir.path(),
        "ops/wrong-kind.yaml",
        &NIGHTLY_SYNC.replace("kind: Job", "kind: Deployment"),
    );
    write(dir.path(), "ops/notes.txt", "not a manifest");

    let jobs = parser.parse_all().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].name, "nightly-sync");
}

#[test]
fn parse_all_fails_when_root_is_missing() {
    let parser = Parser::new("/nonexistent/cormorant-manifests");
    assert!(matches!(
        parser.parse_all(),
        Err(ManifestError::Io { .. })
    ));
}

#[test]
fn missing_id_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let parser = Parser::new(dir.path());
    let no_id = NIGHTLY_SYNC.replace("  id: 00000000-0000-0000-0000-000000000001\n", "");
    let path = write(dir.path(), "ops/no-id.yaml", &no_id);
    assert!(matches!(
        parser.parse_file(&path),
        Err(ManifestError::Yaml { .. })
    ));
}

#[test]
fn overlong_names_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let parser = Parser::new(dir.path());
    let long = NIGHTLY_SYNC.replace("nightly-sync", &"x".repeat(64));
    let path = write(dir.path(), "ops/long.yaml", &long);
    assert!(matches!(
        parser.parse_file(&path),
        Err(ManifestError::Invalid { .. })
    ));
}
