// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake scheduler adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{replaces, SchedulerAdapter, SchedulerError};
use async_trait::async_trait;
use cor_core::{Marker, ScheduledEntry};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Recorded adapter call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Add { command: String },
    Update { command: String },
    Remove { selector: Marker },
    RemoveUnmanaged { command: String },
    List,
    ListAll,
    Verify { selector: Marker },
}

/// In-memory scheduler for testing
#[derive(Clone, Default)]
pub struct FakeSchedulerAdapter {
    entries: Arc<Mutex<Vec<ScheduledEntry>>>,
    calls: Arc<Mutex<Vec<SchedulerCall>>>,
    fail_ops: Arc<Mutex<HashSet<&'static str>>>,
}

impl FakeSchedulerAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an entry directly into the fake store.
    pub fn seed(&self, entry: ScheduledEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
    }

    /// Current store contents.
    pub fn entries(&self) -> Vec<ScheduledEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// All recorded calls.
    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Recorded mutating calls (add/update/remove), in order.
    pub fn mutations(&self) -> Vec<SchedulerCall> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    SchedulerCall::Add { .. }
                        | SchedulerCall::Update { .. }
                        | SchedulerCall::Remove { .. }
                        | SchedulerCall::RemoveUnmanaged { .. }
                )
            })
            .collect()
    }

    /// Make one operation kind fail with a tool error (`"add"`, `"update"`,
    /// `"remove"`).
    pub fn fail_on(&self, op: &'static str) {
        self.fail_ops
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(op);
    }

    fn record(&self, call: SchedulerCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn check_fail(&self, op: &'static str) -> Result<(), SchedulerError> {
        if self
            .fail_ops
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(op)
        {
            return Err(SchedulerError::Tool(format!("injected {} failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl SchedulerAdapter for FakeSchedulerAdapter {
    async fn add(&self, entry: &ScheduledEntry) -> Result<(), SchedulerError> {
        self.record(SchedulerCall::Add {
            command: entry.command.clone(),
        });
        self.check_fail("add")?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(marker) = &entry.marker {
            if entries.iter().any(|e| e.marker.as_ref() == Some(marker)) {
                return Err(SchedulerError::AlreadyExists(marker.clone()));
            }
        }
        entries.push(entry.clone());
        Ok(())
    }

    async fn update(&self, entry: &ScheduledEntry) -> Result<(), SchedulerError> {
        self.record(SchedulerCall::Update {
            command: entry.command.clone(),
        });
        self.check_fail("update")?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for existing in entries.iter_mut() {
            if replaces(existing, entry) {
                *existing = entry.clone();
                return Ok(());
            }
        }
        Err(SchedulerError::NotFound(
            entry.marker.clone().unwrap_or(Marker::Legacy {
                namespace: entry.namespace.clone(),
                name: entry.name.clone(),
            }),
        ))
    }

    async fn remove(&self, selector: &Marker) -> Result<(), SchedulerError> {
        self.record(SchedulerCall::Remove {
            selector: selector.clone(),
        });
        self.check_fail("remove")?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|e| e.marker.as_ref() != Some(selector));
        if entries.len() == before {
            return Err(SchedulerError::NotFound(selector.clone()));
        }
        Ok(())
    }

    async fn remove_unmanaged(&self, command: &str) -> Result<(), SchedulerError> {
        self.record(SchedulerCall::RemoveUnmanaged {
            command: command.to_string(),
        });
        self.check_fail("remove_unmanaged")?;

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|e| e.marker.is_some() || e.command != command);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ScheduledEntry>, SchedulerError> {
        self.record(SchedulerCall::List);
        self.check_fail("list")?;
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.is_managed())
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ScheduledEntry>, SchedulerError> {
        self.record(SchedulerCall::ListAll);
        self.check_fail("list_all")?;
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }

    async fn verify(&self, selector: &Marker) -> Result<bool, SchedulerError> {
        self.record(SchedulerCall::Verify {
            selector: selector.clone(),
        });
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|e| e.marker.as_ref() == Some(selector)))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
