// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command instrumentation
//!
//! A wrapped job's native entry is a fixed-shape helper invocation carrying
//! only the identity marker — tens of characters, no credentials or URLs in
//! the native store. Everything else (the real command, env, cwd) lives in
//! the per-job config record the helper expands the invocation from.
//!
//! The helper's contract: load the record, run the original command capturing
//! combined output and wall-clock time, judge success purely by exit code,
//! report to the collector, and exit with the original code so the native
//! scheduler's own bookkeeping stays accurate.

use cor_core::{identity, JobConfig, JobConfigError, JobConfigStore, JobDefinition, Marker};
use std::path::PathBuf;
use thiserror::Error;

/// Name of the installed helper executable
pub const HELPER_NAME: &str = "cormorant-run";

/// Check-in API path the retired inline shell wrapper posted to
const LEGACY_CHECKIN_PATH: &str = "/api/runs/check-in";

/// Errors from wrapping a command
#[derive(Debug, Error)]
pub enum WrapError {
    #[error("failed to persist job config: {0}")]
    Config(#[from] JobConfigError),
}

/// Builds self-reporting invocations and owns their side-state
#[derive(Debug, Clone)]
pub struct CommandWrapper {
    helper_path: PathBuf,
    store: JobConfigStore,
}

impl CommandWrapper {
    pub fn new(helper_path: impl Into<PathBuf>, store: JobConfigStore) -> Self {
        Self {
            helper_path: helper_path.into(),
            store,
        }
    }

    /// Whether a command still needs instrumentation. Commands already
    /// carrying a check-in invocation — current helper, old inline shell
    /// reporter, or old PowerShell style — are left alone, as are empty
    /// commands.
    pub fn should_wrap(command: &str) -> bool {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return false;
        }
        if trimmed.contains(HELPER_NAME) {
            return false;
        }
        if trimmed.contains(identity::CHECKIN_SIGNATURE) {
            return false;
        }
        if trimmed.contains("curl") && trimmed.contains(LEGACY_CHECKIN_PATH) {
            return false;
        }
        if trimmed.contains("Invoke-RestMethod") && trimmed.contains("check-in") {
            return false;
        }
        true
    }

    /// The fixed-shape native command for a wrapped job. Pure: safe for
    /// comparisons in read-only paths.
    pub fn invocation(&self, job: &JobDefinition) -> String {
        format!(
            "{} {}",
            self.helper_path.display(),
            Marker::Id(job.id).token()
        )
    }

    /// Persist the job's config record, then return the instrumented command.
    pub fn wrap(&self, job: &JobDefinition) -> Result<String, WrapError> {
        self.ensure_config(job)?;
        Ok(self.invocation(job))
    }

    /// Bring the config record in line with the definition. Returns whether a
    /// write happened — the native entry text does not change when only the
    /// payload does, so this runs even for up-to-date entries.
    pub fn ensure_config(&self, job: &JobDefinition) -> Result<bool, WrapError> {
        let config = JobConfig {
            name: job.name.clone(),
            namespace: job.namespace.clone(),
            command: job.full_command(),
            env: job.env.clone(),
            working_dir: job.working_dir.clone(),
        };
        Ok(self.store.ensure(&job.id, &config)?)
    }

    /// Drop the config record for a removed job.
    pub fn remove_config(&self, id: &uuid::Uuid) -> Result<(), WrapError> {
        Ok(self.store.remove(id)?)
    }

    pub fn store(&self) -> &JobConfigStore {
        &self.store
    }
}

#[cfg(test)]
#[path = "wrapper_tests.rs"]
mod tests;
