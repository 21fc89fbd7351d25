// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort identity recovery for unmanaged entries
//!
//! Wrapped commands used to invoke an inline shell reporter:
//!
//! ```text
//! sh -c '(cmd) && /usr/local/bin/cormorant-checkin "nightly-sync" "ops" ...'
//! ```
//!
//! Entries carrying that signature yield their name and namespace back out of
//! the command text; anything else gets a synthesized placeholder so callers
//! never see empty identity fields.

/// Token the old inline reporter invocation ends with
pub const CHECKIN_SIGNATURE: &str = "cormorant-checkin";

/// Namespace assigned to entries whose identity cannot be recovered
pub const DISCOVERED_NAMESPACE: &str = "discovered";

/// Recover `(name, namespace)` from a check-in invocation, if the command
/// carries one. The namespace is `None` when the command ends right after
/// the name.
pub fn recover(command: &str) -> Option<(String, Option<String>)> {
    let idx = command.find(CHECKIN_SIGNATURE)?;
    // the signature must terminate its token (a path prefix is fine)
    let after = &command[idx + CHECKIN_SIGNATURE.len()..];
    if after.chars().next().is_some_and(|c| !c.is_whitespace()) {
        return None;
    }

    let (name, rest) = next_argument(after)?;
    let namespace = next_argument(rest).map(|(ns, _)| ns);
    Some((name, namespace))
}

/// Placeholder name for an entry whose command carries no recognizable
/// identity. The index keeps same-command entries distinct.
pub fn synthesized_name(index: usize) -> String {
    format!("discovered-job-{}", index)
}

/// Take the next shell-ish argument: a quoted span (single or double) or a
/// bare whitespace-delimited token. Returns the argument and the remainder.
fn next_argument(s: &str) -> Option<(String, &str)> {
    let s = s.trim_start();
    let mut chars = s.char_indices();
    let (_, first) = chars.next()?;

    if first == '"' || first == '\'' {
        let end = s[1..].find(first)?;
        let value = &s[1..1 + end];
        if value.is_empty() {
            return None;
        }
        return Some((value.to_string(), &s[end + 2..]));
    }

    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    let token = &s[..end];
    if token.is_empty() {
        return None;
    }
    Some((token.to_string(), &s[end..]))
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
