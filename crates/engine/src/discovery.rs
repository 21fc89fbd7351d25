// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery of pre-existing unmanaged entries
//!
//! Surfaces entries a human or another tool already placed in the native
//! scheduler as candidate job definitions, without mutating them. The
//! authoring system persists candidates it wants to keep; from then on they
//! are desired state like any other, except the `source=discovered` label
//! keeps them un-wrapped and shielded from forced removal.

use cor_adapters::{SchedulerAdapter, SchedulerError};
use cor_core::{IdGen, JobDefinition, UuidIdGen, LABEL_SOURCE, SOURCE_DISCOVERED};
use std::collections::HashMap;
use tracing::debug;

/// Enumerates unmanaged entries and reconstructs candidate definitions
#[derive(Clone)]
pub struct Discovery<S: SchedulerAdapter, G: IdGen = UuidIdGen> {
    adapter: S,
    ids: G,
}

impl<S: SchedulerAdapter> Discovery<S, UuidIdGen> {
    pub fn new(adapter: S) -> Self {
        Self {
            adapter,
            ids: UuidIdGen,
        }
    }
}

impl<S: SchedulerAdapter, G: IdGen> Discovery<S, G> {
    pub fn with_ids(adapter: S, ids: G) -> Self {
        Self { adapter, ids }
    }

    /// Build a candidate definition for every entry lacking a marker.
    /// Entries still carrying the legacy composite marker are managed and
    /// excluded. Identical recovered names are kept distinct with an index
    /// suffix rather than collapsed.
    pub async fn discover(&self) -> Result<Vec<JobDefinition>, SchedulerError> {
        let all = self.adapter.list_all().await?;
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut candidates = Vec::new();

        for entry in all.iter().filter(|e| !e.is_managed()) {
            let count = {
                let count = seen.entry(entry.name.clone()).or_insert(0);
                *count += 1;
                *count
            };
            let name = if count > 1 {
                format!("{}-{}", entry.name, count)
            } else {
                entry.name.clone()
            };

            let mut candidate = JobDefinition::new(
                self.ids.next(),
                name,
                entry.namespace.clone(),
                entry.schedule.clone(),
                entry.command.clone(),
            );
            candidate
                .labels
                .insert(LABEL_SOURCE.to_string(), SOURCE_DISCOVERED.to_string());
            candidates.push(candidate);
        }

        debug!(count = candidates.len(), "discovered unmanaged entries");
        Ok(candidates)
    }
}

#[cfg(test)]
#[path = "discovery_tests.rs"]
mod tests;
