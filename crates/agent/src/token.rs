// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Endpoint token persistence
//!
//! Enrollment happens once; the resulting endpoint id and token are kept on
//! disk (owner-readable only) and reloaded on every later start.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed token file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenData {
    pub endpoint_id: u64,
    pub token: String,
}

/// Load the persisted token, `None` when the agent was never enrolled.
pub fn load(path: &Path) -> Result<Option<TokenData>, TokenError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&text)?))
}

pub fn save(path: &Path, data: &TokenData) -> Result<(), TokenError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string(data)?;
    write_private(path, &text)?;
    Ok(())
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

/// Stable machine identifier for enrollment, best-effort.
#[cfg(unix)]
pub fn machine_id() -> Option<String> {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(id) = fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return Some(id.to_string());
            }
        }
    }
    None
}

#[cfg(not(unix))]
pub fn machine_id() -> Option<String> {
    None
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
