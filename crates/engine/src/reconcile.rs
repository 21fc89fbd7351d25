// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Desired-versus-actual reconciliation
//!
//! One pass re-reads ground truth from the native scheduler, applies the
//! minimal set of adapter operations, and reports how many it applied.
//! Nothing is cached between passes. A failed individual operation is logged
//! and skipped; the next pass re-attempts it naturally because desired and
//! actual state will still disagree.
//!
//! Schedules and commands are compared by exact text. Two functionally
//! identical schedules written differently count as changed.

use crate::wrapper::CommandWrapper;
use cor_adapters::{SchedulerAdapter, SchedulerError};
use cor_core::{JobDefinition, Marker, ScheduledEntry};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a whole pass (individual operation failures do not)
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("scheduler unavailable: {0}")]
    Scheduler(#[from] SchedulerError),
}

/// The native command a job should be scheduled with
struct Effective {
    command: String,
    /// true when the command is the helper invocation and therefore needs a
    /// config record on disk
    wrapped: bool,
}

/// Converges native scheduler state toward desired state
#[derive(Clone)]
pub struct Reconciler<S: SchedulerAdapter> {
    adapter: S,
    wrapper: CommandWrapper,
}

impl<S: SchedulerAdapter> Reconciler<S> {
    pub fn new(adapter: S, wrapper: CommandWrapper) -> Self {
        Self { adapter, wrapper }
    }

    /// Run one reconciliation pass over the full definition set (schedulable
    /// or not — unschedulable definitions still matter for label lookups).
    /// Returns the number of add/update/remove operations applied.
    pub async fn reconcile(&self, definitions: &[JobDefinition]) -> Result<usize, ReconcileError> {
        let desired: Vec<&JobDefinition> =
            definitions.iter().filter(|j| j.is_schedulable()).collect();
        let actual = self.adapter.list().await?;
        let all_entries = self.adapter.list_all().await?;
        let unmanaged: Vec<&ScheduledEntry> =
            all_entries.iter().filter(|e| !e.is_managed()).collect();

        debug!(
            desired = desired.len(),
            actual = actual.len(),
            unmanaged = unmanaged.len(),
            "reconciliation pass"
        );

        let actual_by_key = index_by_marker(&actual);
        let mut claimed: HashSet<Marker> = HashSet::new();
        let mut changes = 0;

        for job in &desired {
            let effective = self.effective(job);
            match self.find_entry(&actual_by_key, job) {
                Some(entry) => {
                    if let Some(marker) = &entry.marker {
                        claimed.insert(marker.clone());
                    }
                    if entry.schedule != job.schedule || entry.command != effective.command {
                        if self.apply_update(job, &effective).await {
                            changes += 1;
                        }
                    } else {
                        debug!(job = %job.name, "up to date");
                        // a payload-only change never alters the native text;
                        // the config record still has to follow it
                        if effective.wrapped {
                            if let Err(e) = self.wrapper.ensure_config(job) {
                                warn!(job = %job.name, error = %e, "failed to refresh job config");
                            }
                        }
                    }
                }
                None => {
                    if self.apply_add(job, &effective, &unmanaged).await {
                        changes += 1;
                    }
                }
            }
        }

        for entry in &actual {
            let Some(marker) = &entry.marker else { continue };
            if claimed.contains(marker) {
                continue;
            }
            if is_discovered(definitions, marker) {
                info!(job = %entry.name, "leaving discovered entry in place");
                continue;
            }
            info!(job = %entry.name, "removing job no longer in desired state");
            match self.adapter.remove(marker).await {
                Ok(()) => {
                    changes += 1;
                    if let Marker::Id(id) = marker {
                        if let Err(e) = self.wrapper.remove_config(id) {
                            warn!(job = %entry.name, error = %e, "failed to remove job config");
                        }
                    }
                }
                Err(e) => warn!(job = %entry.name, error = %e, "failed to remove job"),
            }
        }

        Ok(changes)
    }

    /// Read-only check, stopping at the first difference. Cheap enough to
    /// gate full passes — but drift is not a removal order: discovered
    /// entries report drift here and are still left alone by `reconcile`.
    pub async fn detect_drift(&self, definitions: &[JobDefinition]) -> Result<bool, ReconcileError> {
        let desired: Vec<&JobDefinition> =
            definitions.iter().filter(|j| j.is_schedulable()).collect();
        let actual = self.adapter.list().await?;

        if desired.len() != actual.len() {
            return Ok(true);
        }

        let actual_by_key = index_by_marker(&actual);
        let mut claimed: HashSet<Marker> = HashSet::new();

        for job in &desired {
            let Some(entry) = self.find_entry(&actual_by_key, job) else {
                return Ok(true);
            };
            if let Some(marker) = &entry.marker {
                claimed.insert(marker.clone());
            }
            if entry.schedule != job.schedule || entry.command != self.effective(job).command {
                return Ok(true);
            }
        }

        for entry in &actual {
            if let Some(marker) = &entry.marker {
                if !claimed.contains(marker) {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    /// Match a job against actual state: by id, falling back to the legacy
    /// composite key for entries written before UUID identity.
    fn find_entry<'a>(
        &self,
        actual_by_key: &HashMap<Marker, &'a ScheduledEntry>,
        job: &JobDefinition,
    ) -> Option<&'a ScheduledEntry> {
        actual_by_key
            .get(&Marker::Id(job.id))
            .or_else(|| {
                actual_by_key.get(&Marker::Legacy {
                    namespace: job.namespace.clone(),
                    name: job.name.clone(),
                })
            })
            .copied()
    }

    fn effective(&self, job: &JobDefinition) -> Effective {
        let raw = job.full_command();
        if !job.is_discovered() && CommandWrapper::should_wrap(&raw) {
            return Effective {
                command: self.wrapper.invocation(job),
                wrapped: true,
            };
        }
        // verbatim payload, still tagged with its identity
        Effective {
            command: format!("{} {}", raw, Marker::Id(job.id).token()),
            wrapped: false,
        }
    }

    async fn apply_update(&self, job: &JobDefinition, effective: &Effective) -> bool {
        if effective.wrapped {
            if let Err(e) = self.wrapper.ensure_config(job) {
                warn!(job = %job.name, error = %e, "failed to persist job config, skipping update");
                return false;
            }
        }
        info!(job = %job.name, namespace = %job.namespace, "updating job");
        match self.adapter.update(&native_entry(job, effective)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(job = %job.name, error = %e, "failed to update job");
                false
            }
        }
    }

    async fn apply_add(
        &self,
        job: &JobDefinition,
        effective: &Effective,
        unmanaged: &[&ScheduledEntry],
    ) -> bool {
        // take-over: an unmanaged entry running exactly this command becomes
        // this job instead of a duplicate schedule
        let raw = job.full_command();
        let duplicate = unmanaged.iter().any(|e| e.command == raw);

        if job.is_discovered() && !duplicate {
            // some external actor removed it; observed, not re-created
            info!(job = %job.name, "discovered job absent from scheduler, leaving as-is");
            return false;
        }

        if duplicate {
            info!(job = %job.name, "taking over unmanaged entry with identical command");
            if let Err(e) = self.adapter.remove_unmanaged(&raw).await {
                warn!(job = %job.name, error = %e, "failed to remove unmanaged duplicate");
                return false;
            }
        }

        if effective.wrapped {
            if let Err(e) = self.wrapper.ensure_config(job) {
                warn!(job = %job.name, error = %e, "failed to persist job config, skipping add");
                return false;
            }
        }

        info!(job = %job.name, namespace = %job.namespace, "adding job");
        match self.adapter.add(&native_entry(job, effective)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(job = %job.name, error = %e, "failed to add job");
                false
            }
        }
    }
}

fn index_by_marker(entries: &[ScheduledEntry]) -> HashMap<Marker, &ScheduledEntry> {
    let mut map = HashMap::new();
    for entry in entries {
        if let Some(marker) = &entry.marker {
            map.insert(marker.clone(), entry);
        }
    }
    map
}

fn native_entry(job: &JobDefinition, effective: &Effective) -> ScheduledEntry {
    ScheduledEntry {
        marker: Some(Marker::Id(job.id)),
        name: job.name.clone(),
        namespace: job.namespace.clone(),
        schedule: job.schedule.clone(),
        command: effective.command.clone(),
    }
}

/// Whether the definition owning `marker` carries the discovered label.
/// A definition that disappeared entirely cannot be looked up and its entry
/// is treated as ordinary (removable).
fn is_discovered(definitions: &[JobDefinition], marker: &Marker) -> bool {
    match marker {
        Marker::Id(id) => definitions
            .iter()
            .find(|j| j.id == *id)
            .is_some_and(JobDefinition::is_discovered),
        Marker::Legacy { namespace, name } => definitions
            .iter()
            .find(|j| j.namespace == *namespace && j.name == *name)
            .is_some_and(JobDefinition::is_discovered),
    }
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
