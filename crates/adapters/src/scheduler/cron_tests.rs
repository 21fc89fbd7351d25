// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use cor_core::JobConfig;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// In-memory crontab; `None` simulates a user with no table yet
#[derive(Clone, Default)]
struct FakeCrontab {
    table: Arc<Mutex<Option<String>>>,
    fail_install: Arc<Mutex<bool>>,
}

impl FakeCrontab {
    fn with_table(table: &str) -> Self {
        Self {
            table: Arc::new(Mutex::new(Some(table.to_string()))),
            fail_install: Arc::new(Mutex::new(false)),
        }
    }

    fn contents(&self) -> Option<String> {
        self.table.lock().unwrap().clone()
    }

    fn set_fail_install(&self) {
        *self.fail_install.lock().unwrap() = true;
    }
}

#[async_trait]
impl CrontabRunner for FakeCrontab {
    async fn read(&self) -> Result<Option<String>, SchedulerError> {
        Ok(self.table.lock().unwrap().clone())
    }

    async fn install(&self, table: &str) -> Result<(), SchedulerError> {
        if *self.fail_install.lock().unwrap() {
            return Err(SchedulerError::Tool("install rejected".to_string()));
        }
        *self.table.lock().unwrap() = Some(table.to_string());
        Ok(())
    }
}

fn adapter(crontab: FakeCrontab, dir: &std::path::Path) -> CronAdapter<FakeCrontab> {
    CronAdapter::new(crontab, JobConfigStore::new(dir.join("jobs")))
}

fn managed_entry(id: Uuid, schedule: &str, command: &str) -> ScheduledEntry {
    ScheduledEntry {
        marker: Some(Marker::Id(id)),
        name: "job".to_string(),
        namespace: "default".to_string(),
        schedule: schedule.to_string(),
        command: format!("{} {}", command, Marker::Id(id).token()),
    }
}

#[tokio::test]
async fn add_appends_and_preserves_foreign_lines() {
    let crontab = FakeCrontab::with_table("# backups\nMAILTO=ops@example.com\n0 1 * * * /usr/bin/certwatch\n");
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab.clone(), dir.path());

    let id = Uuid::from_u128(1);
    cron.add(&managed_entry(id, "0 2 * * *", "/usr/local/libexec/cormorant-run"))
        .await
        .unwrap();

    let table = crontab.contents().unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], "# backups");
    assert_eq!(lines[1], "MAILTO=ops@example.com");
    assert_eq!(lines[2], "0 1 * * * /usr/bin/certwatch");
    assert_eq!(
        lines[3],
        format!("0 2 * * * /usr/local/libexec/cormorant-run CORMORANT:{}", id)
    );
}

#[tokio::test]
async fn add_on_empty_crontab_works() {
    let crontab = FakeCrontab::default();
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab.clone(), dir.path());

    cron.add(&managed_entry(Uuid::from_u128(2), "*/5 * * * *", "run"))
        .await
        .unwrap();
    assert_eq!(crontab.contents().unwrap().lines().count(), 1);
}

#[tokio::test]
async fn add_with_colliding_id_fails() {
    let crontab = FakeCrontab::default();
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab.clone(), dir.path());
    let id = Uuid::from_u128(3);

    cron.add(&managed_entry(id, "0 2 * * *", "run")).await.unwrap();
    let err = cron
        .add(&managed_entry(id, "0 3 * * *", "run"))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::AlreadyExists(Marker::Id(found)) if found == id));
}

#[tokio::test]
async fn update_rewrites_in_place() {
    let crontab = FakeCrontab::default();
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab.clone(), dir.path());
    let id = Uuid::from_u128(4);

    cron.add(&managed_entry(id, "0 2 * * *", "run")).await.unwrap();
    cron.add(&managed_entry(Uuid::from_u128(5), "0 6 * * *", "run"))
        .await
        .unwrap();

    cron.update(&managed_entry(id, "30 2 * * *", "run")).await.unwrap();

    let table = crontab.contents().unwrap();
    let lines: Vec<&str> = table.lines().collect();
    // position preserved: the updated job is still the first line
    assert!(lines[0].starts_with("30 2 * * *"));
    assert!(lines[1].starts_with("0 6 * * *"));
}

#[tokio::test]
async fn update_missing_entry_is_not_found() {
    let crontab = FakeCrontab::default();
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab, dir.path());

    let err = cron
        .update(&managed_entry(Uuid::from_u128(6), "0 2 * * *", "run"))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound(_)));
}

#[tokio::test]
async fn update_migrates_legacy_marker_line() {
    let crontab =
        FakeCrontab::with_table("0 2 * * * /opt/sync.sh CORMORANT:ops:nightly-sync\n");
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab.clone(), dir.path());
    let id = Uuid::from_u128(7);

    let mut entry = managed_entry(id, "0 2 * * *", "/usr/local/libexec/cormorant-run");
    entry.name = "nightly-sync".to_string();
    entry.namespace = "ops".to_string();
    cron.update(&entry).await.unwrap();

    let table = crontab.contents().unwrap();
    assert!(table.contains(&format!("CORMORANT:{}", id)));
    assert!(!table.contains("CORMORANT:ops:nightly-sync"));
}

#[tokio::test]
async fn remove_accepts_uuid_and_legacy_selectors() {
    let id = Uuid::from_u128(8);
    let table = format!(
        "0 2 * * * run CORMORANT:{}\n0 3 * * * /opt/old.sh CORMORANT:ops:old-job\n",
        id
    );
    let crontab = FakeCrontab::with_table(&table);
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab.clone(), dir.path());

    cron.remove(&Marker::Id(id)).await.unwrap();
    cron.remove(&Marker::Legacy {
        namespace: "ops".to_string(),
        name: "old-job".to_string(),
    })
    .await
    .unwrap();

    assert_eq!(crontab.contents().unwrap(), "");
}

#[tokio::test]
async fn remove_missing_selector_is_not_found() {
    let crontab = FakeCrontab::default();
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab, dir.path());

    let err = cron.remove(&Marker::Id(Uuid::from_u128(9))).await.unwrap_err();
    assert!(matches!(err, SchedulerError::NotFound(_)));
}

#[tokio::test]
async fn remove_unmanaged_only_touches_unmarked_matches() {
    let id = Uuid::from_u128(10);
    let table = format!(
        "0 1 * * * /usr/bin/certwatch\n0 2 * * * /usr/bin/certwatch {}\n",
        Marker::Id(id).token()
    );
    let crontab = FakeCrontab::with_table(&table);
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab.clone(), dir.path());

    cron.remove_unmanaged("/usr/bin/certwatch").await.unwrap();

    let remaining = crontab.contents().unwrap();
    assert_eq!(remaining.lines().count(), 1);
    assert!(remaining.contains(&Marker::Id(id).token()));

    // absence is not an error
    cron.remove_unmanaged("/usr/bin/certwatch").await.unwrap();
}

#[tokio::test]
async fn list_returns_managed_only() {
    let id = Uuid::from_u128(11);
    let table = format!(
        "# comment\n0 1 * * * /usr/bin/certwatch\n0 2 * * * run {}\n0 3 * * * old CORMORANT:ops:legacy\n",
        Marker::Id(id).token()
    );
    let crontab = FakeCrontab::with_table(&table);
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab, dir.path());

    let managed = cron.list().await.unwrap();
    assert_eq!(managed.len(), 2);
    assert_eq!(managed[0].marker, Some(Marker::Id(id)));
    assert_eq!(
        managed[1].marker,
        Some(Marker::Legacy {
            namespace: "ops".to_string(),
            name: "legacy".to_string(),
        })
    );
}

#[tokio::test]
async fn list_recovers_name_from_config_record() {
    let id = Uuid::from_u128(12);
    let table = format!("0 2 * * * run {}\n", Marker::Id(id).token());
    let crontab = FakeCrontab::with_table(&table);
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab, dir.path());

    cron.configs()
        .store(
            &id,
            &JobConfig {
                name: "nightly-sync".to_string(),
                namespace: "ops".to_string(),
                command: "/opt/sync.sh".to_string(),
                env: Default::default(),
                working_dir: None,
            },
        )
        .unwrap();

    let managed = cron.list().await.unwrap();
    assert_eq!(managed[0].name, "nightly-sync");
    assert_eq!(managed[0].namespace, "ops");
}

#[tokio::test]
async fn list_all_synthesizes_identity_for_unmanaged() {
    let table = "\
0 1 * * * /usr/bin/certwatch
0 2 * * * sh -c '(/opt/sync.sh) && /usr/local/bin/cormorant-checkin \"nightly-sync\" \"ops\"'
";
    let crontab = FakeCrontab::with_table(table);
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab, dir.path());

    let all = cron.list_all().await.unwrap();
    assert_eq!(all.len(), 2);

    assert_eq!(all[0].name, "discovered-job-0");
    assert_eq!(all[0].namespace, "discovered");
    assert!(!all[0].is_managed());

    assert_eq!(all[1].name, "nightly-sync");
    assert_eq!(all[1].namespace, "ops");
}

#[tokio::test]
async fn verify_probes_existence() {
    let id = Uuid::from_u128(13);
    let table = format!("0 2 * * * run {}\n", Marker::Id(id).token());
    let crontab = FakeCrontab::with_table(&table);
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab, dir.path());

    assert!(cron.verify(&Marker::Id(id)).await.unwrap());
    assert!(!cron.verify(&Marker::Id(Uuid::from_u128(99))).await.unwrap());
}

#[tokio::test]
async fn failed_install_leaves_previous_table() {
    let crontab = FakeCrontab::with_table("0 1 * * * /usr/bin/certwatch\n");
    let dir = tempfile::tempdir().unwrap();
    let cron = adapter(crontab.clone(), dir.path());

    crontab.set_fail_install();
    let err = cron
        .add(&managed_entry(Uuid::from_u128(14), "0 2 * * *", "run"))
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Tool(_)));
    assert_eq!(crontab.contents().unwrap(), "0 1 * * * /usr/bin/certwatch\n");
}
