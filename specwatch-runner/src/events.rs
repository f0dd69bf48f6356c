// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events emitted by a [`SessionController`](crate::session::SessionController).
//!
//! The controller never renders anything itself. Display sinks observe these events, or read
//! the session snapshot, and present them however they like.

use crate::{classify::ErrorLogEntry, reconcile::TestStatus};

/// A state change in a run session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// A run started.
    RunStarted {
        /// The suite title of the spec being run.
        suite_title: String,

        /// The number of declared test cases.
        test_count: usize,
    },

    /// A line was appended to the transcript.
    TranscriptLine {
        /// The raw line, with color escapes intact.
        line: String,
    },

    /// A test case is assumed to have started running.
    TestStarted {
        /// The index of the case in declaration order.
        index: usize,

        /// The title of the case.
        title: String,
    },

    /// A test case received its final status.
    TestFinished {
        /// The index of the case in declaration order.
        index: usize,

        /// The title of the case.
        title: String,

        /// The title printed by the runner, which may differ from the declared title.
        signal_title: String,

        /// Either [`TestStatus::Success`] or [`TestStatus::Error`].
        status: TestStatus,
    },

    /// An entry was appended to the error log.
    ErrorLogged {
        /// The new entry.
        entry: ErrorLogEntry,
    },

    /// The error panel should be shown. Emitted at most once per run.
    ErrorPanelRevealed,

    /// The busy indicator changed.
    BusyChanged {
        /// Whether the run is busy.
        busy: bool,
    },

    /// The run finished.
    RunFinished {
        /// The exit code of the runner, or `None` if it was killed or never started.
        exit_code: Option<i32>,

        /// Statistics for the run.
        stats: RunStats,
    },
}

/// Statistics for a run session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// The number of declared test cases.
    pub declared: usize,

    /// The number of cases that passed.
    pub passed: usize,

    /// The number of cases that failed.
    pub failed: usize,

    /// The number of error log entries.
    pub errors_logged: usize,
}

impl RunStats {
    /// Returns the number of cases without a final status.
    #[inline]
    pub fn unresolved(&self) -> usize {
        self.declared - self.passed - self.failed
    }

    /// Returns true if every declared case passed.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.unresolved() == 0
    }
}
