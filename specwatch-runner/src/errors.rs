// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by specwatch.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{error, fmt};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse specwatch config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
///
/// Returned by [`ConfigParseError::kind`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// A regular expression in the config was invalid.
    #[error("invalid regex for `{key}`")]
    InvalidRegex {
        /// The config key holding the regex.
        key: &'static str,

        /// The underlying error.
        #[source]
        err: regex::Error,
    },

    /// A list that must not be empty was empty.
    #[error("`{key}` must not be empty")]
    EmptyList {
        /// The config key holding the list.
        key: &'static str,
    },

    /// A list of names or markers contained a blank entry.
    #[error("`{key}` must not contain blank entries")]
    BlankEntry {
        /// The config key holding the list.
        key: &'static str,
    },
}

/// An error that occurred while scanning a project for spec files.
#[derive(Debug, Error)]
#[error("error scanning `{dir}` for spec files")]
pub struct DiscoveryError {
    dir: Utf8PathBuf,
    #[source]
    err: walkdir::Error,
}

impl DiscoveryError {
    pub(crate) fn new(dir: impl Into<Utf8PathBuf>, err: walkdir::Error) -> Self {
        Self {
            dir: dir.into(),
            err,
        }
    }

    /// Returns the test directory that was being scanned.
    pub fn dir(&self) -> &Utf8PathBuf {
        &self.dir
    }
}

/// An error that occurred while reading the source of a spec file.
#[derive(Debug, Error)]
#[error("error reading spec file `{path}`")]
pub struct ReadSpecError {
    path: Utf8PathBuf,
    #[source]
    err: std::io::Error,
}

impl ReadSpecError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self {
            path: path.into(),
            err,
        }
    }

    /// Returns the path that could not be read.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// An error that occurred while starting a spec run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpawnError {
    /// A run is already in progress.
    #[error("a run is already in progress")]
    AlreadyRunning,

    /// The runner process could not be started.
    #[error("failed to start `{command}`")]
    Spawn {
        /// The command line that was being started.
        command: String,

        /// The underlying error.
        #[source]
        err: std::io::Error,
    },
}

/// An error that occurred while opening a location in the editor.
#[derive(Debug, Error)]
#[error("failed to launch editor `{command}`")]
pub struct EditorLaunchError {
    command: String,
    #[source]
    err: std::io::Error,
}

impl EditorLaunchError {
    pub(crate) fn new(command: impl Into<String>, err: std::io::Error) -> Self {
        Self {
            command: command.into(),
            err,
        }
    }
}

/// An error returned while parsing a `path:line:col` location.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid source location `{input}`: {reason}")]
pub struct SourceLocationParseError {
    input: String,
    reason: &'static str,
}

impl SourceLocationParseError {
    pub(crate) fn new(input: impl Into<String>, reason: &'static str) -> Self {
        Self {
            input: input.into(),
            reason,
        }
    }
}

/// Displays an error along with its chain of causes, one per line.
#[derive(Debug)]
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut current = self.error.source();
        while let Some(cause) = current {
            write!(f, "\n  caused by: {cause}")?;
            current = cause.source();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_error_chain_lists_causes() {
        let err = ReadSpecError::new(
            "test/login.spec.js",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(
            DisplayErrorChain::new(&err).to_string(),
            "error reading spec file `test/login.spec.js`\n  caused by: no such file",
        );
    }
}
