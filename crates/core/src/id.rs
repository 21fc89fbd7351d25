// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Generates job identifiers
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> Uuid;
}

/// Random v4 UUID generator for production use
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Deterministic generator for testing
#[derive(Clone)]
pub struct FixedIdGen {
    counter: Arc<AtomicU64>,
}

impl FixedIdGen {
    pub fn new() -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for FixedIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGen for FixedIdGen {
    fn next(&self) -> Uuid {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Uuid::from_u128(u128::from(n))
    }
}
