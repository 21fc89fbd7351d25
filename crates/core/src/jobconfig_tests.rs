// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn config() -> JobConfig {
    JobConfig {
        name: "nightly-sync".to_string(),
        namespace: "ops".to_string(),
        command: "/usr/local/bin/sync.sh --all 'with spaces'".to_string(),
        env: BTreeMap::from([("RUST_LOG".to_string(), "info".to_string())]),
        working_dir: Some(PathBuf::from("/var/lib/sync")),
    }
}

#[test]
fn store_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobConfigStore::new(dir.path());
    let id = Uuid::from_u128(1);

    assert_eq!(store.load(&id).unwrap(), None);

    store.store(&id, &config()).unwrap();
    assert_eq!(store.load(&id).unwrap(), Some(config()));
}

#[test]
fn ensure_writes_only_on_change() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobConfigStore::new(dir.path());
    let id = Uuid::from_u128(2);

    assert!(store.ensure(&id, &config()).unwrap());
    assert!(!store.ensure(&id, &config()).unwrap());

    let mut changed = config();
    changed.command = "/usr/local/bin/sync.sh --fast".to_string();
    assert!(store.ensure(&id, &changed).unwrap());
    assert_eq!(store.load(&id).unwrap(), Some(changed));
}

#[test]
fn remove_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = JobConfigStore::new(dir.path());
    let id = Uuid::from_u128(3);

    store.store(&id, &config()).unwrap();
    store.remove(&id).unwrap();
    assert_eq!(store.load(&id).unwrap(), None);

    // already gone
    store.remove(&id).unwrap();
}

#[cfg(unix)]
#[test]
fn records_are_not_world_readable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let store = JobConfigStore::new(dir.path());
    let id = Uuid::from_u128(4);

    store.store(&id, &config()).unwrap();
    let mode = std::fs::metadata(store.path(&id)).unwrap().permissions().mode();
    assert_eq!(mode & 0o077, 0);
}
