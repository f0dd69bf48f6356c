// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recognition of per-test pass/fail lines in runner output.
//!
//! Runners report each finished test as a human-readable line: a marker glyph followed by the
//! test title, optionally followed by a duration such as `(123ms)`.

use crate::config::OutputConfig;
use itertools::Itertools;
use regex::Regex;
use std::sync::LazyLock;

static DURATION_SUFFIX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+\(\d+ms\).*$").unwrap_or_else(|err| panic!("duration regex is valid: {err}"))
});

/// The outcome reported by a signal line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignalKind {
    /// The test passed.
    Pass,

    /// The test failed.
    Fail,
}

/// A parsed signal line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalLine {
    /// Whether the test passed or failed.
    pub kind: SignalKind,

    /// The test title as printed by the runner, without the duration annotation.
    pub title: String,
}

/// Parses signal lines out of normalized runner output.
#[derive(Clone, Debug)]
pub struct SignalParser {
    pass: Regex,
    fail: Regex,
}

impl SignalParser {
    /// Creates a new parser for the configured markers.
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            pass: marker_regex(&config.pass_markers),
            fail: marker_regex(&config.fail_markers),
        }
    }

    /// Parses a normalized line. Pass markers are checked before fail markers.
    pub fn parse(&self, line: &str) -> Option<SignalLine> {
        [(&self.pass, SignalKind::Pass), (&self.fail, SignalKind::Fail)]
            .into_iter()
            .find_map(|(regex, kind)| {
                let captures = regex.captures(line)?;
                let title = DURATION_SUFFIX_REGEX.replace(&captures[1], "");
                Some(SignalLine {
                    kind,
                    title: title.trim().to_owned(),
                })
            })
    }
}

fn marker_regex(markers: &[String]) -> Regex {
    let markers = markers.iter().map(|marker| regex::escape(marker)).join("|");
    let pattern = format!(r"(?:{markers})\s+(.+)");
    Regex::new(&pattern).unwrap_or_else(|err| panic!("marker regex `{pattern}` is valid: {err}"))
}
