// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Normalization of runner output lines before matching.

use regex::Regex;
use std::{borrow::Cow, sync::LazyLock};

static SGR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[\d+m").unwrap_or_else(|err| panic!("SGR regex is valid: {err}"))
});

/// Strips ANSI SGR color and style escapes (`ESC [ <digits> m`) from a line.
///
/// Lines without escapes are returned as-is, without allocating.
pub fn strip_sgr(line: &str) -> Cow<'_, str> {
    if !line.contains('\x1b') {
        return Cow::Borrowed(line);
    }
    SGR_REGEX.replace_all(line, "")
}
