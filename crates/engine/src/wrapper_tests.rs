// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use uuid::Uuid;

fn wrapper(dir: &std::path::Path) -> CommandWrapper {
    CommandWrapper::new(
        "/usr/local/libexec/cormorant-run",
        JobConfigStore::new(dir.join("jobs")),
    )
}

fn job() -> JobDefinition {
    let mut job = JobDefinition::new(
        Uuid::from_u128(1),
        "nightly-sync",
        "ops",
        "0 2 * * *",
        "/opt/sync.sh",
    );
    job.args = vec!["--all".to_string()];
    job
}

#[test]
fn plain_commands_are_wrapped() {
    assert!(CommandWrapper::should_wrap("/opt/sync.sh --all"));
    assert!(CommandWrapper::should_wrap("curl https://example.com/data"));
}

#[test]
fn already_instrumented_commands_are_refused() {
    // current helper form
    assert!(!CommandWrapper::should_wrap(
        "/usr/local/libexec/cormorant-run CORMORANT:8f7e"
    ));
    // old inline shell reporter
    assert!(!CommandWrapper::should_wrap(
        "sh -c '(/opt/sync.sh) && /usr/local/bin/cormorant-checkin \"nightly-sync\" \"ops\"'"
    ));
    // old inline curl style
    assert!(!CommandWrapper::should_wrap(
        "sh -c '(/opt/sync.sh) && curl -X POST https://api.example.com/api/runs/check-in'"
    ));
    // old PowerShell style
    assert!(!CommandWrapper::should_wrap(
        "powershell.exe -Command \"try { sync } catch { Invoke-RestMethod -Uri 'https://x/check-in' }\""
    ));
}

#[test]
fn empty_commands_are_refused() {
    assert!(!CommandWrapper::should_wrap(""));
    assert!(!CommandWrapper::should_wrap("   "));
}

#[test]
fn wrap_persists_config_and_returns_short_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let w = wrapper(dir.path());
    let job = job();

    let wrapped = w.wrap(&job).unwrap();
    assert_eq!(
        wrapped,
        format!(
            "/usr/local/libexec/cormorant-run CORMORANT:{}",
            job.id
        )
    );
    // the native text carries no trace of the payload
    assert!(!wrapped.contains("sync.sh"));

    let config = w.store().load(&job.id).unwrap().unwrap();
    assert_eq!(config.name, "nightly-sync");
    assert_eq!(config.namespace, "ops");
    assert_eq!(config.command, "/opt/sync.sh --all");
}

#[test]
fn ensure_config_tracks_payload_changes() {
    let dir = tempfile::tempdir().unwrap();
    let w = wrapper(dir.path());
    let mut job = job();

    assert!(w.ensure_config(&job).unwrap());
    assert!(!w.ensure_config(&job).unwrap());

    job.args = vec!["--fast".to_string()];
    assert!(w.ensure_config(&job).unwrap());
    assert_eq!(
        w.store().load(&job.id).unwrap().unwrap().command,
        "/opt/sync.sh --fast"
    );
}

#[test]
fn invocation_is_pure_and_stable() {
    let dir = tempfile::tempdir().unwrap();
    let w = wrapper(dir.path());
    let job = job();

    let invocation = w.invocation(&job);
    assert_eq!(invocation, w.invocation(&job));
    // no record was written
    assert!(w.store().load(&job.id).unwrap().is_none());
}

#[test]
fn remove_config_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let w = wrapper(dir.path());
    let job = job();

    w.wrap(&job).unwrap();
    w.remove_config(&job.id).unwrap();
    assert!(w.store().load(&job.id).unwrap().is_none());
}
