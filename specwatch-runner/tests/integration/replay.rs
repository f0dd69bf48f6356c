// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::replay_login;
use pretty_assertions::assert_eq;
use specwatch_runner::{
    classify::LinkKind,
    events::SessionEvent,
    location::SourceLocation,
    reconcile::TestStatus,
    session::{RunCompletion, RunSession},
};
use test_case::test_case;

fn statuses(session: &RunSession) -> Vec<(&str, TestStatus)> {
    session
        .cases()
        .iter()
        .map(|case| (case.title.as_str(), case.status))
        .collect()
}

#[test]
fn passing_run() {
    let replay = replay_login("login-pass.log", 4096, Some(0));
    let session = replay.controller.session().expect("session started");

    assert_eq!(session.suite_title(), "Login Page");
    assert_eq!(
        statuses(session),
        vec![
            ("should display the login form", TestStatus::Success),
            ("should login with valid credentials", TestStatus::Success),
            ("should reject a wrong password", TestStatus::Success),
        ]
    );
    assert!(session.error_log().is_empty());
    assert!(!session.is_error_panel_revealed());
    assert!(!session.is_busy());
    assert_eq!(session.completion(), Some(RunCompletion { exit_code: Some(0) }));
    assert!(replay.stats.is_success());
}

#[test]
fn failing_run() {
    let replay = replay_login("login-fail.log", 4096, Some(1));
    let session = replay.controller.session().expect("session started");

    assert_eq!(
        statuses(session),
        vec![
            ("should display the login form", TestStatus::Success),
            ("should login with valid credentials", TestStatus::Success),
            ("should reject a wrong password", TestStatus::Error),
        ]
    );
    assert!(session.is_past_summary());
    assert!(session.is_error_panel_revealed());

    // Errors repeated in the summary section aren't logged again.
    let texts: Vec<_> = session.error_log().iter().map(|entry| entry.text()).collect();
    assert_eq!(
        texts,
        vec![
            "Error: expect(received).toBe(expected) // Object.is equality",
            "Expected: \"Invalid credentials\"",
            "Received: \"Welcome, admin\"",
            "    at Context.<anonymous> (/home/dev/shop/test/e2e/login.spec.js:22:45)",
            "    at processTicksAndRejections (/home/dev/shop/node_modules/@wdio/utils/build/shim.js:77:5)",
        ]
    );

    let frame = &session.error_log()[3];
    assert_eq!(frame.line_number(), Some("22"));
    assert_eq!(
        frame.first_clickable(),
        Some(&SourceLocation {
            path: "/home/dev/shop/test/e2e/login.spec.js".into(),
            line: 22,
            column: 45,
        })
    );

    let vendored = &session.error_log()[4];
    assert_eq!(vendored.line_number(), None);
    assert_eq!(vendored.links().len(), 1);
    assert_eq!(vendored.links()[0].kind, LinkKind::Vendored);

    assert_eq!(
        replay
            .events
            .iter()
            .filter(|event| **event == SessionEvent::ErrorPanelRevealed)
            .count(),
        1
    );
    assert_eq!(replay.stats.failed, 1);
    assert_eq!(replay.stats.errors_logged, 5);
}

#[test]
fn crashed_run_leaves_tests_unresolved() {
    let replay = replay_login("login-crash.log", 4096, None);
    let session = replay.controller.session().expect("session started");

    assert_eq!(
        statuses(session),
        vec![
            ("should display the login form", TestStatus::Success),
            ("should login with valid credentials", TestStatus::Running),
            ("should reject a wrong password", TestStatus::Queued),
        ]
    );
    // The final line has no terminator and is never processed.
    assert!(session.pending_output().starts_with("[chrome"));
    assert!(
        !session
            .transcript()
            .iter()
            .any(|line| line.contains("chromedriver")),
    );
    assert_eq!(replay.stats.unresolved(), 2);
    assert_eq!(
        replay.events.last(),
        Some(&SessionEvent::RunFinished {
            exit_code: None,
            stats: replay.stats,
        })
    );
}

#[test_case(1 ; "single bytes")]
#[test_case(3 ; "splits multi-byte characters")]
#[test_case(17 ; "odd size")]
#[test_case(256 ; "large chunks")]
fn chunk_size_does_not_matter(chunk_size: usize) {
    let expected = replay_login("login-fail.log", usize::MAX, Some(1));
    let actual = replay_login("login-fail.log", chunk_size, Some(1));
    assert_eq!(actual.events, expected.events);
}
