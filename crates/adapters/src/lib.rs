// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cor-adapters: native scheduler backends
//!
//! One contract, two backends: a crontab-based adapter for POSIX hosts and a
//! schtasks-based adapter for Windows. Callers depend only on the
//! [`SchedulerAdapter`] trait; the backend is picked at startup by platform.

pub mod scheduler;

pub use scheduler::cron::{CronAdapter, CrontabRunner, SystemCrontab};
pub use scheduler::taskschd::{SchtasksRunner, TaskRunner, TaskSchedulerAdapter, ToolOutput};
pub use scheduler::{SchedulerAdapter, SchedulerError};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use scheduler::fake::{FakeSchedulerAdapter, SchedulerCall};

use cor_core::JobConfigStore;
use std::path::Path;

/// The adapter for the platform this agent was built for
#[cfg(unix)]
pub type NativeAdapter = CronAdapter;
#[cfg(windows)]
pub type NativeAdapter = TaskSchedulerAdapter;

/// Build the native adapter for this platform. `state_dir` is the agent
/// state directory holding per-job config records.
#[cfg(unix)]
pub fn native_adapter(state_dir: &Path) -> NativeAdapter {
    CronAdapter::new(SystemCrontab, JobConfigStore::new(state_dir.join("jobs")))
}

#[cfg(windows)]
pub fn native_adapter(state_dir: &Path) -> NativeAdapter {
    TaskSchedulerAdapter::new(SchtasksRunner, JobConfigStore::new(state_dir.join("jobs")))
}
