// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desired-state job definitions
//!
//! Produced by the external authoring system and synced onto the machine as
//! manifests; the UUID is the sole identity key. Names are human labels and
//! may repeat across jobs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// Label key recording where a job definition originated
pub const LABEL_SOURCE: &str = "source";

/// Label value marking a job recovered from a pre-existing native entry.
/// Discovered jobs are never wrapped and their external removal is observed,
/// not reverted.
pub const SOURCE_DISCOVERED: &str = "discovered";

/// One job as desired state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub id: Uuid,
    pub name: String,
    /// Derived from the manifest's directory, never from the name
    pub namespace: String,
    /// Opaque 5-field cron expression, compared by exact text
    pub schedule: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl JobDefinition {
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        namespace: impl Into<String>,
        schedule: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            namespace: namespace.into(),
            schedule: schedule.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            working_dir: None,
            enabled: true,
            paused: false,
            labels: BTreeMap::new(),
        }
    }

    /// A job lands in the native scheduler iff enabled and not paused.
    pub fn is_schedulable(&self) -> bool {
        self.enabled && !self.paused
    }

    /// Whether this definition originated from discovery of an unmanaged entry
    pub fn is_discovered(&self) -> bool {
        self.labels
            .get(LABEL_SOURCE)
            .is_some_and(|v| v == SOURCE_DISCOVERED)
    }

    /// The complete command line: command plus arguments
    pub fn full_command(&self) -> String {
        if self.args.is_empty() {
            return self.command.clone();
        }
        let mut parts = vec![self.command.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
