// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job configuration records
//!
//! A wrapped entry's native command is just the helper plus an identity
//! marker; this record is what the helper expands it back into. One TOML
//! file per job id under the agent's state directory. The record must stay
//! in sync with desired state even when the native entry text does not
//! change (the short invocation never encodes the payload).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors from reading or writing job config records
#[derive(Debug, Error)]
pub enum JobConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed job config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize job config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// What the run helper needs to execute and report one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub namespace: String,
    /// The original, un-wrapped command line
    pub command: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

/// Directory of per-job config records, keyed by job id
#[derive(Debug, Clone)]
pub struct JobConfigStore {
    dir: PathBuf,
}

impl JobConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{}.toml", id))
    }

    /// Load the record for a job, `None` if it was never written.
    pub fn load(&self, id: &Uuid) -> Result<Option<JobConfig>, JobConfigError> {
        let path = self.path(id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(toml::from_str(&text)?))
    }

    /// Write the record unconditionally.
    pub fn store(&self, id: &Uuid, config: &JobConfig) -> Result<(), JobConfigError> {
        fs::create_dir_all(&self.dir)?;
        let text = toml::to_string_pretty(config)?;
        write_private(&self.path(id), &text)?;
        Ok(())
    }

    /// Write only when the stored record differs. Returns whether a write
    /// happened.
    pub fn ensure(&self, id: &Uuid, config: &JobConfig) -> Result<bool, JobConfigError> {
        if self.load(id)?.as_ref() == Some(config) {
            return Ok(false);
        }
        self.store(id, config)?;
        Ok(true)
    }

    /// Delete a record; a missing file is not an error.
    pub fn remove(&self, id: &Uuid) -> Result<(), JobConfigError> {
        match fs::remove_file(self.path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn write_private(path: &Path, text: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(text.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, text: &str) -> std::io::Result<()> {
    fs::write(path, text)
}

#[cfg(test)]
#[path = "jobconfig_tests.rs"]
mod tests;
