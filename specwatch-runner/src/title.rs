// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static extraction of suite and test case titles from spec source text.
//!
//! This is a lightweight pattern match over the source, not a parse. Titles declared in nested
//! blocks are flattened into a single list in textual order, and unrecognized syntax yields an
//! empty result rather than an error.

use crate::config::ExtractConfig;
use itertools::Itertools;
use regex::{Captures, Regex};

/// The suite title and test case titles declared in a spec file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecOutline {
    /// The title of the first suite declared in the file, if any.
    pub suite_title: Option<String>,

    /// The titles of all declared test cases, in source order. May contain duplicates.
    pub test_titles: Vec<String>,
}

impl SpecOutline {
    /// Returns the suite title, or `fallback` if no suite declaration was found.
    pub fn suite_title_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.suite_title.as_deref().unwrap_or(fallback)
    }
}

/// Extracts [`SpecOutline`]s from spec source text.
#[derive(Clone, Debug)]
pub struct TitleExtractor {
    suite_regex: Regex,
    case_regex: Regex,
}

impl TitleExtractor {
    /// Creates a new extractor for the configured suite and case function names.
    pub fn new(config: &ExtractConfig) -> Self {
        Self {
            suite_regex: call_regex(&config.suite_functions),
            case_regex: call_regex(&config.case_functions),
        }
    }

    /// Extracts the outline of the given source text.
    pub fn extract(&self, source: &str) -> SpecOutline {
        SpecOutline {
            suite_title: self.extract_suite_title(source),
            test_titles: self.extract_test_titles(source),
        }
    }

    /// Returns the first suite title declared in the source, if any.
    pub fn extract_suite_title(&self, source: &str) -> Option<String> {
        self.suite_regex
            .captures(source)
            .map(|captures| quoted_argument(&captures).to_owned())
    }

    /// Returns all test case titles declared in the source, in order.
    pub fn extract_test_titles(&self, source: &str) -> Vec<String> {
        self.case_regex
            .captures_iter(source)
            .map(|captures| quoted_argument(&captures).to_owned())
            .collect()
    }
}

/// Builds a regex matching a call to one of `functions` whose first argument is a quoted
/// string. Exactly one of the capture groups 1-3 participates in a match, depending on the
/// quote character.
fn call_regex(functions: &[String]) -> Regex {
    let names = functions.iter().map(|name| regex::escape(name)).join("|");
    let pattern = format!(r#"\b(?:{names})\s*\(\s*(?:'([^']+)'|"([^"]+)"|`([^`]+)`)"#);
    // Function names are escaped, so the pattern is always valid.
    Regex::new(&pattern).unwrap_or_else(|err| panic!("call regex `{pattern}` is valid: {err}"))
}

fn quoted_argument<'h>(captures: &Captures<'h>) -> &'h str {
    (1..=3)
        .find_map(|group| captures.get(group))
        .map_or("", |m| m.as_str())
}
