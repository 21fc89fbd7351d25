// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler adapter contract

use async_trait::async_trait;
use cor_core::{Marker, ScheduledEntry};
use thiserror::Error;

pub mod cron;
pub mod fake;
pub mod taskschd;

/// Errors from native scheduler operations
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("entry already exists: {0}")]
    AlreadyExists(Marker),
    #[error("entry not found: {0}")]
    NotFound(Marker),
    #[error("schedule not supported by this backend: {0}")]
    UnsupportedSchedule(String),
    #[error("scheduler tool failed: {0}")]
    Tool(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Uniform CRUD + enumeration over one OS's scheduling primitive.
///
/// Mutation is serialized by the caller: a reconciliation pass runs to
/// completion before the next may start, because neither backend offers a
/// transactional guarantee across tool invocations.
#[async_trait]
pub trait SchedulerAdapter: Clone + Send + Sync + 'static {
    /// Create a new entry. The entry's command text must already embed its
    /// marker. Fails with `AlreadyExists` when an entry with the same id is
    /// present.
    async fn add(&self, entry: &ScheduledEntry) -> Result<(), SchedulerError>;

    /// Replace an existing entry, matched by id or — for entries still
    /// carrying the composite legacy marker of the same job — by namespace
    /// and name. Fails with `NotFound` when nothing matches.
    async fn update(&self, entry: &ScheduledEntry) -> Result<(), SchedulerError>;

    /// Remove the entry matching the selector (UUID or legacy composite).
    async fn remove(&self, selector: &Marker) -> Result<(), SchedulerError>;

    /// Remove unmarked entries whose raw command equals `command` exactly.
    /// Absence is not an error.
    async fn remove_unmanaged(&self, command: &str) -> Result<(), SchedulerError>;

    /// Entries carrying a marker, current or legacy format.
    async fn list(&self) -> Result<Vec<ScheduledEntry>, SchedulerError>;

    /// Every entry, managed or not. Unmanaged entries come back with
    /// synthesized identity so callers never see empty fields.
    async fn list_all(&self) -> Result<Vec<ScheduledEntry>, SchedulerError>;

    /// Existence probe for tests and operational tooling; not used on the
    /// reconciliation hot path.
    async fn verify(&self, selector: &Marker) -> Result<bool, SchedulerError>;
}

/// Whether an existing entry is the one `entry` should replace: same id, or
/// a legacy composite marker naming the same job (the migration path).
pub(crate) fn replaces(existing: &ScheduledEntry, entry: &ScheduledEntry) -> bool {
    match (&existing.marker, &entry.marker) {
        (Some(a), Some(b)) if a == b => true,
        (Some(Marker::Legacy { namespace, name }), Some(Marker::Id(_))) => {
            *namespace == entry.namespace && *name == entry.name
        }
        _ => false,
    }
}
