// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The session controller: drives a single run from raw output chunks to derived state.
//!
//! A [`SessionController`] owns at most one [`RunSession`]. Starting a run discards the
//! previous session entirely. Each chunk fed in is split into lines, and each line goes through
//! the transcript, the [normalizer](crate::normalize), the [error log](crate::classify) and the
//! [reconciler](crate::reconcile), in that order. State changes are reported to a callback as
//! [`SessionEvent`]s.
//!
//! The controller is synchronous. Waiting for output is the caller's business; see
//! [`process`](crate::process).

use crate::{
    classify::{ErrorClassifier, ErrorLog, ErrorLogEntry, ErrorOutcome},
    config::OutputConfig,
    events::{RunStats, SessionEvent},
    line_buffer::LineBuffer,
    normalize::strip_sgr,
    reconcile::{Reconciler, TestCase, TestStatus},
    signal::SignalParser,
};
use tracing::debug;

/// How a run session ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RunCompletion {
    /// The exit code of the runner, or `None` if it was killed or never started.
    pub exit_code: Option<i32>,
}

/// The state of a single run.
#[derive(Clone, Debug)]
pub struct RunSession {
    suite_title: String,
    reconciler: Reconciler,
    error_log: ErrorLog,
    lines: LineBuffer,
    transcript: Vec<String>,
    error_panel_revealed: bool,
    busy: bool,
    completion: Option<RunCompletion>,
}

impl RunSession {
    fn new(suite_title: String, reconciler: Reconciler) -> Self {
        Self {
            suite_title,
            reconciler,
            error_log: ErrorLog::new(),
            lines: LineBuffer::new(),
            transcript: Vec::new(),
            error_panel_revealed: false,
            busy: false,
            completion: None,
        }
    }

    /// Returns the suite title of the run.
    pub fn suite_title(&self) -> &str {
        &self.suite_title
    }

    /// Returns the declared test cases with their current statuses.
    pub fn cases(&self) -> &[TestCase] {
        self.reconciler.queue().cases()
    }

    /// Returns the error log entries.
    pub fn error_log(&self) -> &[ErrorLogEntry] {
        self.error_log.entries()
    }

    /// Returns true once the runner has printed its failure summary.
    pub fn is_past_summary(&self) -> bool {
        self.error_log.is_past_summary()
    }

    /// Returns the raw transcript of the run.
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Returns true if the error panel has been revealed.
    pub fn is_error_panel_revealed(&self) -> bool {
        self.error_panel_revealed
    }

    /// Returns the busy indicator.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Returns how the run ended, or `None` if it is still in progress.
    pub fn completion(&self) -> Option<RunCompletion> {
        self.completion
    }

    /// Returns the output received after the last newline, which is not processed.
    pub fn pending_output(&self) -> &str {
        self.lines.carry()
    }

    /// Computes statistics for the run so far.
    pub fn stats(&self) -> RunStats {
        let queue = self.reconciler.queue();
        RunStats {
            declared: queue.len(),
            passed: queue.count(TestStatus::Success),
            failed: queue.count(TestStatus::Error),
            errors_logged: self.error_log.entries().len(),
        }
    }

    fn push_transcript<F>(&mut self, line: String, callback: &mut F)
    where
        F: FnMut(SessionEvent),
    {
        self.transcript.push(line.clone());
        callback(SessionEvent::TranscriptLine { line });
    }

    fn reveal_error_panel<F>(&mut self, callback: &mut F)
    where
        F: FnMut(SessionEvent),
    {
        if !self.error_panel_revealed {
            self.error_panel_revealed = true;
            callback(SessionEvent::ErrorPanelRevealed);
        }
    }

    fn set_busy<F>(&mut self, busy: bool, callback: &mut F)
    where
        F: FnMut(SessionEvent),
    {
        if self.busy != busy {
            self.busy = busy;
            callback(SessionEvent::BusyChanged { busy });
        }
    }

    fn set_running<F>(&mut self, index: usize, callback: &mut F)
    where
        F: FnMut(SessionEvent),
    {
        if self.reconciler.set_running(index) {
            self.emit_started(index, callback);
        }
    }

    fn emit_started<F>(&mut self, index: usize, callback: &mut F)
    where
        F: FnMut(SessionEvent),
    {
        let title = self.cases()[index].title.clone();
        callback(SessionEvent::TestStarted { index, title });
        self.set_busy(true, callback);
    }

    fn process_line<F>(
        &mut self,
        classifier: &ErrorClassifier,
        signals: &SignalParser,
        raw: String,
        callback: &mut F,
    ) where
        F: FnMut(SessionEvent),
    {
        let normalized = strip_sgr(&raw).trim_end_matches('\r').to_owned();
        self.push_transcript(raw, callback);

        let outcome = self.error_log.ingest(classifier, &normalized);
        if outcome == ErrorOutcome::Appended
            && let Some(entry) = self.error_log.entries().last()
        {
            callback(SessionEvent::ErrorLogged {
                entry: entry.clone(),
            });
        }
        if outcome.is_error() {
            self.reveal_error_panel(callback);
        }

        let Some(signal) = signals.parse(&normalized) else {
            return;
        };
        let Some(matched) = self.reconciler.on_signal(&signal.title, signal.kind) else {
            return;
        };
        debug!(
            "signal `{}` matched test {} with score {}",
            signal.title, matched.index, matched.score
        );

        let title = self.cases()[matched.index].title.clone();
        callback(SessionEvent::TestFinished {
            index: matched.index,
            title,
            signal_title: signal.title,
            status: matched.status,
        });
        if matched.status == TestStatus::Error {
            self.reveal_error_panel(callback);
        }
        if let Some(next) = matched.next_running {
            self.emit_started(next, callback);
        }
    }
}

/// Drives run sessions.
#[derive(Clone, Debug)]
pub struct SessionController {
    classifier: ErrorClassifier,
    signals: SignalParser,
    session: Option<RunSession>,
}

impl SessionController {
    /// Creates a new controller. No session is active.
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            classifier: ErrorClassifier::new(config),
            signals: SignalParser::new(config),
            session: None,
        }
    }

    /// Returns the current session, if a run has been started.
    pub fn session(&self) -> Option<&RunSession> {
        self.session.as_ref()
    }

    /// Starts a new run, discarding the previous session.
    ///
    /// Every declared case is queued, then the first one is marked running: execution is
    /// assumed to begin with the first declared case.
    pub fn start_run<I, S, F>(&mut self, suite_title: impl Into<String>, titles: I, mut callback: F)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(SessionEvent),
    {
        let session = self.session.insert(RunSession::new(
            suite_title.into(),
            Reconciler::new(titles),
        ));
        callback(SessionEvent::RunStarted {
            suite_title: session.suite_title.clone(),
            test_count: session.cases().len(),
        });
        session.set_running(0, &mut callback);
    }

    /// Feeds a chunk of runner output.
    ///
    /// Chunks may split lines anywhere. Only complete lines are processed; the trailing
    /// fragment waits for the next chunk.
    pub fn feed<F>(&mut self, chunk: &str, mut callback: F)
    where
        F: FnMut(SessionEvent),
    {
        let Some(session) = active_session(&mut self.session, "feed") else {
            return;
        };
        for line in session.lines.push(chunk) {
            session.process_line(&self.classifier, &self.signals, line, &mut callback);
        }
    }

    /// Appends a lifecycle message, such as a spawn failure, to the transcript.
    ///
    /// Messages are not classified or matched against tests.
    pub fn note<F>(&mut self, message: impl Into<String>, mut callback: F)
    where
        F: FnMut(SessionEvent),
    {
        let Some(session) = self.session.as_mut() else {
            debug!("no session to note message in");
            return;
        };
        session.push_transcript(message.into(), &mut callback);
    }

    /// Marks the run as complete.
    ///
    /// Cases that are still queued or running stay that way. Returns the final statistics, or
    /// `None` if there was no run in progress.
    pub fn complete<F>(&mut self, exit_code: Option<i32>, mut callback: F) -> Option<RunStats>
    where
        F: FnMut(SessionEvent),
    {
        let session = active_session(&mut self.session, "complete")?;
        if !session.pending_output().is_empty() {
            debug!(
                "dropping unterminated output at end of run: {:?}",
                session.pending_output()
            );
        }
        session.completion = Some(RunCompletion { exit_code });
        session.set_busy(false, &mut callback);

        let stats = session.stats();
        callback(SessionEvent::RunFinished { exit_code, stats });
        Some(stats)
    }
}

fn active_session<'a>(
    session: &'a mut Option<RunSession>,
    operation: &str,
) -> Option<&'a mut RunSession> {
    match session {
        Some(session) if session.completion.is_none() => Some(session),
        Some(_) => {
            debug!("ignoring {operation}: run already complete");
            None
        }
        None => {
            debug!("ignoring {operation}: no run started");
            None
        }
    }
}
