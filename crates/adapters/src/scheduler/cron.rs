// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crontab-backed scheduler adapter
//!
//! The native table has no line-level edit primitive, so every mutation is a
//! full read, an in-memory rewrite, and one whole-table install. Lines that
//! are not entries (comments, blanks, environment assignments) and foreign
//! entries pass through rewrites byte-identical. `crontab` installs the new
//! table atomically; a failed install leaves the previous table in place.

use super::{replaces, SchedulerAdapter, SchedulerError};
use async_trait::async_trait;
use cor_core::{identity, JobConfigStore, Marker, ScheduledEntry};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Reads and installs the user crontab.
///
/// The real implementation shells out to `crontab`; tests substitute an
/// in-memory table.
#[async_trait]
pub trait CrontabRunner: Clone + Send + Sync + 'static {
    /// Current table text, `None` when the user has no crontab yet.
    async fn read(&self) -> Result<Option<String>, SchedulerError>;

    /// Replace the whole table.
    async fn install(&self, table: &str) -> Result<(), SchedulerError>;
}

/// Shells out to the system `crontab` tool
#[derive(Clone, Default)]
pub struct SystemCrontab;

#[async_trait]
impl CrontabRunner for SystemCrontab {
    async fn read(&self) -> Result<Option<String>, SchedulerError> {
        let output = Command::new("crontab").arg("-l").output().await?;
        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
        }
        // crontab exits 1 when the user has no table yet
        if output.status.code() == Some(1) {
            return Ok(None);
        }
        Err(SchedulerError::Tool(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }

    async fn install(&self, table: &str) -> Result<(), SchedulerError> {
        let mut child = Command::new("crontab")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(table.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(SchedulerError::Tool(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(())
    }
}

/// Cron-style backend over a [`CrontabRunner`]
#[derive(Clone)]
pub struct CronAdapter<R: CrontabRunner = SystemCrontab> {
    runner: R,
    configs: JobConfigStore,
}

impl<R: CrontabRunner> CronAdapter<R> {
    pub fn new(runner: R, configs: JobConfigStore) -> Self {
        Self { runner, configs }
    }

    pub fn configs(&self) -> &JobConfigStore {
        &self.configs
    }

    async fn read_lines(&self) -> Result<Vec<String>, SchedulerError> {
        let table = self.runner.read().await?.unwrap_or_default();
        Ok(table.lines().map(str::to_string).collect())
    }

    async fn install_lines(&self, lines: &[String]) -> Result<(), SchedulerError> {
        let mut table = lines.join("\n");
        if !table.is_empty() {
            table.push('\n');
        }
        self.runner.install(&table).await
    }

    /// Parse one table line into an entry. `index` keeps placeholder names
    /// distinct across the table.
    fn entry_from_line(&self, line: &str, index: usize) -> Option<ScheduledEntry> {
        let (schedule, command) = split_entry(line)?;
        let entry = match Marker::parse(&command) {
            Some(Marker::Id(id)) => {
                // name and namespace live in the per-job config record; the
                // entry itself only carries the UUID
                let (name, namespace) = match self.configs.load(&id) {
                    Ok(Some(config)) => (config.name, config.namespace),
                    _ => (id.to_string(), "default".to_string()),
                };
                ScheduledEntry {
                    marker: Some(Marker::Id(id)),
                    name,
                    namespace,
                    schedule,
                    command,
                }
            }
            Some(Marker::Legacy { namespace, name }) => ScheduledEntry {
                marker: Some(Marker::Legacy {
                    namespace: namespace.clone(),
                    name: name.clone(),
                }),
                name,
                namespace,
                schedule,
                command,
            },
            None => {
                let (name, namespace) = match identity::recover(&command) {
                    Some((name, namespace)) => (
                        name,
                        namespace.unwrap_or_else(|| identity::DISCOVERED_NAMESPACE.to_string()),
                    ),
                    None => (
                        identity::synthesized_name(index),
                        identity::DISCOVERED_NAMESPACE.to_string(),
                    ),
                };
                ScheduledEntry {
                    marker: None,
                    name,
                    namespace,
                    schedule,
                    command,
                }
            }
        };
        Some(entry)
    }
}

#[async_trait]
impl<R: CrontabRunner> SchedulerAdapter for CronAdapter<R> {
    async fn add(&self, entry: &ScheduledEntry) -> Result<(), SchedulerError> {
        let mut lines = self.read_lines().await?;

        if let Some(Marker::Id(id)) = &entry.marker {
            for line in &lines {
                let Some((_, command)) = split_entry(line) else {
                    continue;
                };
                if Marker::parse(&command) == Some(Marker::Id(*id)) {
                    return Err(SchedulerError::AlreadyExists(Marker::Id(*id)));
                }
            }
        }

        lines.push(render_entry(entry));
        self.install_lines(&lines).await
    }

    async fn update(&self, entry: &ScheduledEntry) -> Result<(), SchedulerError> {
        let mut lines = self.read_lines().await?;
        let mut found = false;

        // rewrite in place within the single read-modify-write pass; a legacy
        // line for the same job is rewritten to the current format here
        for (index, line) in lines.iter_mut().enumerate() {
            let Some(existing) = self.entry_from_line(line, index) else {
                continue;
            };
            if replaces(&existing, entry) {
                *line = render_entry(entry);
                found = true;
                break;
            }
        }

        if !found {
            return Err(SchedulerError::NotFound(target_marker(entry)));
        }
        self.install_lines(&lines).await
    }

    async fn remove(&self, selector: &Marker) -> Result<(), SchedulerError> {
        let lines = self.read_lines().await?;
        let mut kept = Vec::with_capacity(lines.len());
        let mut found = false;

        for line in lines {
            let is_match = split_entry(&line)
                .and_then(|(_, command)| Marker::parse(&command))
                .is_some_and(|marker| marker == *selector);
            if is_match {
                found = true;
            } else {
                kept.push(line);
            }
        }

        if !found {
            return Err(SchedulerError::NotFound(selector.clone()));
        }
        self.install_lines(&kept).await
    }

    async fn remove_unmanaged(&self, command: &str) -> Result<(), SchedulerError> {
        let lines = self.read_lines().await?;
        let mut kept = Vec::with_capacity(lines.len());
        let mut found = false;

        for line in lines {
            let is_match = match split_entry(&line) {
                Some((_, entry_command)) => {
                    Marker::parse(&entry_command).is_none() && entry_command == command
                }
                None => false,
            };
            if is_match {
                found = true;
            } else {
                kept.push(line);
            }
        }

        if !found {
            return Ok(());
        }
        self.install_lines(&kept).await
    }

    async fn list(&self) -> Result<Vec<ScheduledEntry>, SchedulerError> {
        let lines = self.read_lines().await?;
        Ok(lines
            .iter()
            .enumerate()
            .filter_map(|(index, line)| self.entry_from_line(line, index))
            .filter(ScheduledEntry::is_managed)
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ScheduledEntry>, SchedulerError> {
        let lines = self.read_lines().await?;
        Ok(lines
            .iter()
            .enumerate()
            .filter_map(|(index, line)| self.entry_from_line(line, index))
            .collect())
    }

    async fn verify(&self, selector: &Marker) -> Result<bool, SchedulerError> {
        let lines = self.read_lines().await?;
        Ok(lines.iter().any(|line| {
            split_entry(line)
                .and_then(|(_, command)| Marker::parse(&command))
                .is_some_and(|marker| marker == *selector)
        }))
    }
}

/// Split a table line into its five schedule fields and the command
/// remainder. Comments, blanks, and lines with fewer than six fields
/// (environment assignments, `@reboot`-style shorthands) are not entries.
fn split_entry(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let fields: Vec<&str> = trimmed.split_whitespace().collect();
    if fields.len() < 6 {
        return None;
    }
    Some((fields[..5].join(" "), fields[5..].join(" ")))
}

fn render_entry(entry: &ScheduledEntry) -> String {
    format!("{} {}", entry.schedule, entry.command)
}

fn target_marker(entry: &ScheduledEntry) -> Marker {
    entry.marker.clone().unwrap_or(Marker::Legacy {
        namespace: entry.namespace.clone(),
        name: entry.name.clone(),
    })
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
