// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identity markers embedded in managed command text
//!
//! Neither backend offers a durable per-entry annotation that survives a
//! round-trip through its native store, so every entry Cormorant creates
//! carries a greppable `CORMORANT:` tag inside the command text itself.
//! The current format tags the job's UUID; the composite `namespace:name`
//! format predates UUID identity and must keep parsing and matching by its
//! own key until the entry is rewritten.

use std::fmt;
use uuid::Uuid;

/// Tag prefix embedded in every managed entry's command text
pub const MARKER_PREFIX: &str = "CORMORANT:";

/// Identity tag recovered from (or written into) a native entry.
///
/// Doubles as the selector for remove/verify and as the key actual state is
/// diffed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Current format: the owning job definition's UUID
    Id(Uuid),
    /// Pre-UUID composite format, matched by namespace and name
    Legacy { namespace: String, name: String },
}

impl Marker {
    /// Extract the marker from a command line, if it carries one.
    pub fn parse(command: &str) -> Option<Marker> {
        let idx = command.find(MARKER_PREFIX)?;
        let tail = &command[idx + MARKER_PREFIX.len()..];
        let token = tail.split_whitespace().next()?;

        if let Ok(id) = Uuid::parse_str(token) {
            return Some(Marker::Id(id));
        }

        let (namespace, name) = token.split_once(':')?;
        if namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Marker::Legacy {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    /// Render the marker as the token embedded in command text.
    pub fn token(&self) -> String {
        match self {
            Marker::Id(id) => format!("{}{}", MARKER_PREFIX, id),
            Marker::Legacy { namespace, name } => {
                format!("{}{}:{}", MARKER_PREFIX, namespace, name)
            }
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

#[cfg(test)]
#[path = "marker_tests.rs"]
mod tests;
