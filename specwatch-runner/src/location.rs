// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source locations referenced from runner output.

use crate::errors::SourceLocationParseError;
use camino::Utf8PathBuf;
use std::{fmt, str::FromStr};

/// A `path:line:col` reference to a position in a source file.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// The path to the file, as printed by the runner.
    pub path: Utf8PathBuf,

    /// The 1-based line number.
    pub line: u32,

    /// The 1-based column number.
    pub column: u32,
}

impl FromStr for SourceLocation {
    type Err = SourceLocationParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        // Split from the right: Windows paths contain a colon after the drive letter.
        let mut parts = input.rsplitn(3, ':');
        let column = parts.next();
        let line = parts.next();
        let path = parts.next();

        let (Some(path), Some(line), Some(column)) = (path, line, column) else {
            return Err(SourceLocationParseError::new(
                input,
                "expected the form path:line:col",
            ));
        };
        if path.is_empty() {
            return Err(SourceLocationParseError::new(input, "path is empty"));
        }
        let line = line
            .parse()
            .map_err(|_| SourceLocationParseError::new(input, "line is not a number"))?;
        let column = column
            .parse()
            .map_err(|_| SourceLocationParseError::new(input, "column is not a number"))?;

        Ok(Self {
            path: path.into(),
            line,
            column,
        })
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("/home/dev/app/test/login.spec.js:12:5", "/home/dev/app/test/login.spec.js", 12, 5 ; "unix")]
    #[test_case(r"C:\dev\app\test\login.spec.ts:3:17", r"C:\dev\app\test\login.spec.ts", 3, 17 ; "windows")]
    fn parse_valid(input: &str, path: &str, line: u32, column: u32) {
        let location: SourceLocation = input.parse().expect("valid location");
        assert_eq!(
            location,
            SourceLocation {
                path: path.into(),
                line,
                column,
            }
        );
        assert_eq!(location.to_string(), input);
    }

    #[test_case("login.spec.js" ; "no numbers")]
    #[test_case("login.spec.js:12" ; "no column")]
    #[test_case(":12:5" ; "empty path")]
    #[test_case("login.spec.js:x:5" ; "bad line")]
    #[test_case("login.spec.js:12:" ; "bad column")]
    fn parse_invalid(input: &str) {
        input
            .parse::<SourceLocation>()
            .expect_err("location is invalid");
    }
}
