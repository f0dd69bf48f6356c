// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation of pass/fail signals with the declared test cases.
//!
//! The declared cases come from static extraction, and the signals from free-form runner output,
//! so the two rarely agree character for character. Signals are attributed with a scored fuzzy
//! match, and execution is assumed to be sequential in declaration order.

use crate::signal::SignalKind;
use std::{collections::HashMap, fmt};
use tracing::debug;

/// Score for a signal title equal to the case title.
pub const EXACT_SCORE: u32 = 10;

/// Score for a signal title that starts with the case title.
pub const PREFIX_SCORE: u32 = 5;

/// Score for titles where one contains the other.
pub const CONTAINS_SCORE: u32 = 1;

/// The status of a declared test case.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TestStatus {
    /// The test hasn't started yet.
    Queued,

    /// The test is assumed to be running.
    Running,

    /// The test passed.
    Success,

    /// The test failed.
    Error,
}

impl TestStatus {
    /// Returns true if the test has a final outcome.
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl From<SignalKind> for TestStatus {
    fn from(kind: SignalKind) -> Self {
        match kind {
            SignalKind::Pass => Self::Success,
            SignalKind::Fail => Self::Error,
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "passed",
            Self::Error => "failed",
        };
        f.write_str(s)
    }
}

/// A test case declared in a spec file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    /// The trimmed title.
    pub title: String,

    /// The current status.
    pub status: TestStatus,

    /// The position of the case in declaration order.
    pub ordinal: usize,
}

/// The declared test cases of a run, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct ExecutionQueue {
    cases: Vec<TestCase>,
    // Duplicate titles aren't removed: the last one registered wins.
    by_title: HashMap<String, usize>,
}

impl ExecutionQueue {
    /// Builds a queue with every case queued.
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut queue = Self::default();
        for (ordinal, title) in titles.into_iter().enumerate() {
            let title = title.as_ref().trim().to_owned();
            queue.by_title.insert(title.clone(), ordinal);
            queue.cases.push(TestCase {
                title,
                status: TestStatus::Queued,
                ordinal,
            });
        }
        queue
    }

    /// Returns the cases in declaration order.
    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    /// Returns the case at `index`.
    pub fn get(&self, index: usize) -> Option<&TestCase> {
        self.cases.get(index)
    }

    /// Looks up a case by its exact (trimmed) title.
    pub fn find(&self, title: &str) -> Option<&TestCase> {
        self.by_title
            .get(title.trim())
            .and_then(|&index| self.cases.get(index))
    }

    /// Returns the number of cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns true if no cases were declared.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Returns the index of the running case, if any.
    pub fn running(&self) -> Option<usize> {
        self.cases
            .iter()
            .position(|case| case.status == TestStatus::Running)
    }

    /// Returns the number of cases without a final outcome.
    pub fn unresolved_count(&self) -> usize {
        self.cases
            .iter()
            .filter(|case| !case.status.is_resolved())
            .count()
    }

    /// Returns the number of cases with the given status.
    pub fn count(&self, status: TestStatus) -> usize {
        self.cases
            .iter()
            .filter(|case| case.status == status)
            .count()
    }
}

/// Scores how well a signal title matches a case title. Zero means no match.
pub fn match_score(case_title: &str, signal_title: &str) -> u32 {
    let case_title = case_title.trim();
    let signal_title = signal_title.trim();
    if case_title == signal_title {
        EXACT_SCORE
    } else if signal_title.starts_with(case_title) {
        PREFIX_SCORE
    } else if signal_title.contains(case_title) || case_title.contains(signal_title) {
        CONTAINS_SCORE
    } else {
        0
    }
}

/// A signal attributed to a case.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SignalMatch {
    /// The index of the matched case.
    pub index: usize,

    /// The new status of the matched case.
    pub status: TestStatus,

    /// The score of the match.
    pub score: u32,

    /// The index of the case that was marked running next, if any.
    pub next_running: Option<usize>,
}

/// Tracks the status of every declared case as signals arrive.
#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    queue: ExecutionQueue,
}

impl Reconciler {
    /// Creates a new reconciler over the given titles. No case is running yet.
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            queue: ExecutionQueue::new(titles),
        }
    }

    /// Returns the execution queue.
    pub fn queue(&self) -> &ExecutionQueue {
        &self.queue
    }

    /// Marks the case at `index` as running.
    ///
    /// This does nothing unless the case exists, is queued, and no other case is running.
    /// Returns true if the case was marked running.
    pub fn set_running(&mut self, index: usize) -> bool {
        if self.queue.running().is_some() {
            return false;
        }
        match self.queue.cases.get_mut(index) {
            Some(case) if case.status == TestStatus::Queued => {
                case.status = TestStatus::Running;
                true
            }
            _ => false,
        }
    }

    /// Attributes a signal to the best-matching unresolved case, then marks the following case
    /// as running.
    ///
    /// Returns `None` if no unresolved case matches.
    pub fn on_signal(&mut self, title: &str, kind: SignalKind) -> Option<SignalMatch> {
        let mut best: Option<(usize, u32)> = None;
        for case in &self.queue.cases {
            if case.status.is_resolved() {
                continue;
            }
            let score = match_score(&case.title, title);
            // Ties keep the earliest case.
            if score > best.map_or(0, |(_, best_score)| best_score) {
                best = Some((case.ordinal, score));
            }
        }

        let Some((index, score)) = best else {
            debug!("signal `{title}` matched no unresolved test");
            return None;
        };

        let status = TestStatus::from(kind);
        self.queue.cases[index].status = status;
        let next_running = self.set_running(index + 1).then_some(index + 1);

        Some(SignalMatch {
            index,
            status,
            score,
            next_running,
        })
    }
}
