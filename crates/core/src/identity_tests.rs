// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn recovers_quoted_name_and_namespace() {
    let command =
        r#"sh -c '(/opt/sync.sh) && /usr/local/bin/cormorant-checkin "nightly-sync" "ops" --ok'"#;
    assert_eq!(
        recover(command),
        Some(("nightly-sync".to_string(), Some("ops".to_string())))
    );
}

#[test]
fn recovers_bare_tokens() {
    let command = "/usr/local/bin/cormorant-checkin backup prod && true";
    assert_eq!(
        recover(command),
        Some(("backup".to_string(), Some("prod".to_string())))
    );
}

#[test]
fn single_quotes_work_too() {
    let command = "cormorant-checkin 'db dump' 'staging'";
    assert_eq!(
        recover(command),
        Some(("db dump".to_string(), Some("staging".to_string())))
    );
}

#[test]
fn name_without_namespace() {
    let command = "/usr/local/bin/cormorant-checkin lonely";
    assert_eq!(recover(command), Some(("lonely".to_string(), None)));
}

#[test]
fn signature_must_end_its_token() {
    // "cormorant-checkin2" is some other binary
    assert_eq!(recover("/usr/bin/cormorant-checkin2 name ns"), None);
}

#[test]
fn plain_commands_recover_nothing() {
    assert_eq!(recover("/usr/bin/backup --all"), None);
    assert_eq!(recover(""), None);
}

#[test]
fn synthesized_names_carry_the_index() {
    assert_eq!(synthesized_name(0), "discovered-job-0");
    assert_eq!(synthesized_name(12), "discovered-job-12");
}
