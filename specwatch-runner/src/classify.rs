// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of runner output lines into an error feed.
//!
//! Runner output has no schema: errors are recognized by a handful of textual markers
//! (`Error:`, `AssertionError`, stack frames and so on). Once the runner prints its summary
//! (`N failing`), it tends to repeat every failure; everything from that point on is kept out of
//! the error feed.

use crate::{config::OutputConfig, location::SourceLocation};
use itertools::Itertools;
use regex::Regex;
use std::ops::Range;
use tracing::debug;

/// Substrings that mark a line as describing an error.
const ERROR_MARKERS: &[&str] = &[
    "Error:",
    "failed",
    "AssertionError",
    "Expected:",
    "Received:",
    "TypeError:",
];

/// Returns true if the line looks like part of an error report.
///
/// This does not take the summary boundary into account; see [`ErrorClassifier::classify`].
pub fn has_error_marker(line: &str) -> bool {
    ERROR_MARKERS.iter().any(|marker| line.contains(marker)) || line.trim_start().starts_with("at ")
}

/// What a normalized output line means for the error feed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineClass {
    /// The line reports the failure count, e.g. `2 failing`.
    Summary,

    /// The line looks like part of an error report.
    Error,

    /// Anything else.
    Other,
}

/// A range of an error log entry's text that references a source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkSpan {
    /// The byte range within [`ErrorLogEntry::text`].
    pub range: Range<usize>,

    /// Whether and where the span links to.
    pub kind: LinkKind,
}

/// The kind of a [`LinkSpan`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkKind {
    /// A location in project code, which can be opened in the editor.
    Clickable(SourceLocation),

    /// A location inside the vendoring directory. Shown dimmed, never opened.
    Vendored,
}

/// A single entry of the error feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorLogEntry {
    text: String,
    line_number: Option<String>,
    links: Vec<LinkSpan>,
}

impl ErrorLogEntry {
    /// The normalized text of the line.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The line number from a stack frame outside the vendoring directory, if the line has one.
    pub fn line_number(&self) -> Option<&str> {
        self.line_number.as_deref()
    }

    /// Source locations referenced by the text, in order.
    pub fn links(&self) -> &[LinkSpan] {
        &self.links
    }

    /// Returns the first location that can be opened in the editor.
    pub fn first_clickable(&self) -> Option<&SourceLocation> {
        self.links.iter().find_map(|span| match &span.kind {
            LinkKind::Clickable(location) => Some(location),
            LinkKind::Vendored => None,
        })
    }
}

/// Compiled patterns used to classify lines and build error log entries.
#[derive(Clone, Debug)]
pub struct ErrorClassifier {
    summary: Regex,
    stack_frame: Regex,
    link: Regex,
    vendor_dir: String,
}

impl ErrorClassifier {
    /// Creates a new classifier from the output configuration.
    pub fn new(config: &OutputConfig) -> Self {
        let extensions = config
            .source_extensions
            .iter()
            .map(|ext| regex::escape(ext))
            .join("|");
        // `@` shows up in scoped package directories such as `node_modules/@wdio`.
        let link = format!(r"(?:[a-zA-Z]:\\|/)[a-zA-Z0-9_\-\\/.@]+\.(?:{extensions}):\d+:\d+");

        Self {
            summary: compile(r"\d+\s+failing"),
            stack_frame: compile(r"at .*[ (](.*):(\d+):(\d+)\)?"),
            link: compile(&link),
            vendor_dir: config.vendor_dir.clone(),
        }
    }

    /// Classifies a normalized line. Summary lines take precedence over error markers.
    pub fn classify(&self, line: &str) -> LineClass {
        if self.summary.is_match(line) {
            LineClass::Summary
        } else if has_error_marker(line) {
            LineClass::Error
        } else {
            LineClass::Other
        }
    }

    /// Extracts the line number from a stack frame in the line, unless the frame points into
    /// the vendoring directory.
    pub fn stack_line_number(&self, line: &str) -> Option<String> {
        let captures = self.stack_frame.captures(line)?;
        if self.is_vendored(&captures[1]) {
            return None;
        }
        Some(captures[2].to_owned())
    }

    /// Finds the source locations referenced by the line.
    pub fn link_spans(&self, line: &str) -> Vec<LinkSpan> {
        self.link
            .find_iter(line)
            .filter_map(|m| {
                // A match that starts in the middle of a longer path is the tail of a relative
                // path, which can't be opened.
                if line[..m.start()].chars().next_back().is_some_and(is_path_char) {
                    return None;
                }
                let kind = if self.is_vendored(m.as_str()) {
                    LinkKind::Vendored
                } else {
                    // The regex only matches digits here, but they could still overflow.
                    LinkKind::Clickable(m.as_str().parse().ok()?)
                };
                Some(LinkSpan {
                    range: m.range(),
                    kind,
                })
            })
            .collect()
    }

    /// Builds an error log entry for a normalized line.
    pub fn make_entry(&self, line: &str) -> ErrorLogEntry {
        ErrorLogEntry {
            text: line.to_owned(),
            line_number: self.stack_line_number(line),
            links: self.link_spans(line),
        }
    }

    fn is_vendored(&self, path: &str) -> bool {
        !self.vendor_dir.is_empty() && path.contains(self.vendor_dir.as_str())
    }
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '\\' | '/' | '.' | '@')
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("regex `{pattern}` is valid: {err}"))
}

/// What [`ErrorLog::ingest`] did with a line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorOutcome {
    /// The line is not an error line.
    Ignored,

    /// The line is a summary line. The log no longer accepts entries.
    Summary,

    /// The line looks like an error but the summary boundary has been passed.
    Suppressed,

    /// The line is an error line identical to the previous entry.
    Duplicate,

    /// The line was appended as a new entry.
    Appended,
}

impl ErrorOutcome {
    /// Returns true if the line was recognized as an actionable error, whether or not it was
    /// appended.
    pub fn is_error(self) -> bool {
        matches!(self, Self::Duplicate | Self::Appended)
    }
}

/// The error feed of a single run.
#[derive(Clone, Debug, Default)]
pub struct ErrorLog {
    past_summary: bool,
    entries: Vec<ErrorLogEntry>,
}

impl ErrorLog {
    /// Creates a new, empty error log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes a normalized line.
    ///
    /// An error line identical to the last appended entry is collapsed, even if non-error
    /// lines were printed in between.
    pub fn ingest(&mut self, classifier: &ErrorClassifier, line: &str) -> ErrorOutcome {
        match classifier.classify(line) {
            LineClass::Summary => {
                if !self.past_summary {
                    debug!("summary boundary reached: {line:?}");
                }
                self.past_summary = true;
                ErrorOutcome::Summary
            }
            LineClass::Other => ErrorOutcome::Ignored,
            LineClass::Error if self.past_summary => ErrorOutcome::Suppressed,
            LineClass::Error => {
                if self.entries.last().is_some_and(|last| last.text == line) {
                    return ErrorOutcome::Duplicate;
                }
                self.entries.push(classifier.make_entry(line));
                ErrorOutcome::Appended
            }
        }
    }

    /// Returns true once a summary line has been seen.
    pub fn is_past_summary(&self) -> bool {
        self.past_summary
    }

    /// Returns the entries recorded so far.
    pub fn entries(&self) -> &[ErrorLogEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpecwatchConfig;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn classifier() -> ErrorClassifier {
        ErrorClassifier::new(SpecwatchConfig::default_config("/fake").output())
    }

    #[test_case("Error: element not found", LineClass::Error ; "error prefix")]
    #[test_case("    TypeError: x is undefined", LineClass::Error ; "type error")]
    #[test_case("AssertionError [ERR_ASSERTION]: 1 == 2", LineClass::Error ; "assertion error")]
    #[test_case("    at Context.<anonymous> (/p/test/a.spec.js:4:9)", LineClass::Error ; "stack frame")]
    #[test_case("Expected: \"admin\"", LineClass::Error ; "expected")]
    #[test_case("Received: \"guest\"", LineClass::Error ; "received")]
    #[test_case("[0-0] login failed after retry", LineClass::Error ; "failed word")]
    #[test_case("  2 failing", LineClass::Summary ; "summary")]
    #[test_case("1 failing (Error: in summary)", LineClass::Summary ; "summary wins over markers")]
    #[test_case("  3 passing (4s)", LineClass::Other ; "passing count")]
    #[test_case("✓ logs in", LineClass::Other ; "success line")]
    #[test_case("waiting at the gate", LineClass::Other ; "at in the middle")]
    fn classify(line: &str, expected: LineClass) {
        assert_eq!(classifier().classify(line), expected);
    }

    #[test_case("    at Context.<anonymous> (/p/test/login.spec.js:12:5)", Some("12") ; "project frame")]
    #[test_case("    at async /p/test/login.spec.js:7:3", Some("7") ; "frame without parens")]
    #[test_case("    at Browser.wrap (/p/node_modules/webdriverio/build/index.js:88:20)", None ; "vendored frame")]
    #[test_case("Error: no frame here", None ; "no frame")]
    fn stack_line_number(line: &str, expected: Option<&str>) {
        assert_eq!(
            classifier().stack_line_number(line).as_deref(),
            expected
        );
    }

    #[test]
    fn link_spans() {
        let line = "at x (/p/test/login.spec.js:12:5) via (/p/node_modules/wdio/index.js:1:2)";
        let spans = classifier().link_spans(line);
        assert_eq!(spans.len(), 2);

        assert_eq!(&line[spans[0].range.clone()], "/p/test/login.spec.js:12:5");
        assert_eq!(
            spans[0].kind,
            LinkKind::Clickable(SourceLocation {
                path: "/p/test/login.spec.js".into(),
                line: 12,
                column: 5,
            })
        );

        assert_eq!(
            &line[spans[1].range.clone()],
            "/p/node_modules/wdio/index.js:1:2"
        );
        assert_eq!(spans[1].kind, LinkKind::Vendored);
    }

    #[test]
    fn link_spans_windows_and_extensions() {
        let classifier = classifier();
        let spans = classifier.link_spans(r"at C:\app\test\cart.spec.tsx:3:1 and /app/readme.md:1:1");
        assert_eq!(spans.len(), 1);
        assert_eq!(
            spans[0].kind,
            LinkKind::Clickable(SourceLocation {
                path: r"C:\app\test\cart.spec.tsx".into(),
                line: 3,
                column: 1,
            })
        );

        // Relative paths are not linked.
        assert!(classifier.link_spans("at test/cart.spec.js:3:1").is_empty());
    }

    #[test]
    fn scoped_package_paths_are_vendored() {
        let line = "    at next (/p/node_modules/@wdio/utils/build/shim.js:77:5)";
        let spans = classifier().link_spans(line);
        assert_eq!(spans.len(), 1);
        assert_eq!(
            &line[spans[0].range.clone()],
            "/p/node_modules/@wdio/utils/build/shim.js:77:5"
        );
        assert_eq!(spans[0].kind, LinkKind::Vendored);
    }

    #[test]
    fn malformed_frame_still_recorded() {
        let classifier = classifier();
        let mut log = ErrorLog::new();
        assert_eq!(
            log.ingest(&classifier, "    at <anonymous>"),
            ErrorOutcome::Appended
        );
        let entry = &log.entries()[0];
        assert_eq!(entry.line_number(), None);
        assert!(entry.links().is_empty());
        assert_eq!(entry.first_clickable(), None);
    }

    #[test]
    fn consecutive_duplicates_collapse() {
        let classifier = classifier();
        let mut log = ErrorLog::new();
        assert_eq!(log.ingest(&classifier, "Error: X"), ErrorOutcome::Appended);
        assert_eq!(log.ingest(&classifier, "Error: X"), ErrorOutcome::Duplicate);
        assert_eq!(log.ingest(&classifier, "Error: X"), ErrorOutcome::Duplicate);
        assert_eq!(log.ingest(&classifier, "Error: Y"), ErrorOutcome::Appended);
        assert_eq!(log.ingest(&classifier, "Error: X"), ErrorOutcome::Appended);

        let texts: Vec<_> = log.entries().iter().map(ErrorLogEntry::text).collect();
        assert_eq!(texts, vec!["Error: X", "Error: Y", "Error: X"]);
    }

    #[test]
    fn duplicates_collapse_across_non_error_lines() {
        let classifier = classifier();
        let mut log = ErrorLog::new();
        assert_eq!(
            log.ingest(&classifier, "Error: element not found"),
            ErrorOutcome::Appended
        );
        assert_eq!(log.ingest(&classifier, ""), ErrorOutcome::Ignored);
        assert_eq!(log.ingest(&classifier, "retrying"), ErrorOutcome::Ignored);
        assert_eq!(
            log.ingest(&classifier, "Error: element not found"),
            ErrorOutcome::Duplicate
        );
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn duplicate_after_intervening_error_is_kept() {
        let classifier = classifier();
        let mut log = ErrorLog::new();
        log.ingest(&classifier, "Error: X");
        log.ingest(&classifier, "    at /p/test/a.spec.js:1:1");
        log.ingest(&classifier, "Error: X");
        assert_eq!(log.entries().len(), 3);
    }

    #[test]
    fn summary_latch_suppresses_errors() {
        let classifier = classifier();
        let mut log = ErrorLog::new();
        assert_eq!(log.ingest(&classifier, "Error: before"), ErrorOutcome::Appended);
        assert_eq!(log.ingest(&classifier, "  1 failing"), ErrorOutcome::Summary);
        assert!(log.is_past_summary());
        assert_eq!(
            log.ingest(&classifier, "  1) Login Page should login:"),
            ErrorOutcome::Ignored
        );
        assert_eq!(log.ingest(&classifier, "Error: after"), ErrorOutcome::Suppressed);
        assert_eq!(
            log.ingest(&classifier, "    at /p/test/a.spec.js:1:1"),
            ErrorOutcome::Suppressed
        );
        assert_eq!(log.entries().len(), 1);
    }
}
