// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use specwatch_runner::errors::{
    ConfigParseError, DiscoveryError, EditorLaunchError, ReadSpecError, SourceLocationParseError,
    SpawnError,
};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Exit codes used by specwatch.
pub enum SpecwatchExitCode {}

impl SpecwatchExitCode {
    /// The command completed successfully, and every test in the run passed.
    pub const OK: i32 = 0;

    /// A test in the run failed, or the runner exited with a non-zero code.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The runner stopped before every declared test reported a result.
    pub const INCOMPLETE_RUN: i32 = 106;

    /// An error occurred while setting up the command, for example reading the config.
    pub const SETUP_ERROR: i32 = 96;

    /// The runner or the editor could not be started.
    pub const SPAWN_FAILED: i32 = 97;

    /// Writing output to the terminal failed.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}

// The #[error()] strings are placeholders. Errors are meant to be printed with
// display_to_stderr, which colorizes them.

/// An error expected to happen during normal operation, reported to the user.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("current directory is invalid")]
    CurrentDirInvalid {
        #[source]
        err: std::io::Error,
    },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("discovery error")]
    DiscoveryError {
        #[from]
        err: DiscoveryError,
    },
    #[error("error reading spec")]
    ReadSpecError {
        #[from]
        err: ReadSpecError,
    },
    #[error("error reading log")]
    ReadLogError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("spec file not found")]
    SpecNotFound { path: Utf8PathBuf },
    #[error("invalid source location")]
    SourceLocationParseError {
        #[from]
        err: SourceLocationParseError,
    },
    #[error("failed to create Tokio runtime")]
    TokioRuntimeCreateError {
        #[source]
        err: std::io::Error,
    },
    #[error("spawn error")]
    SpawnError {
        #[from]
        err: SpawnError,
    },
    #[error("editor launch error")]
    EditorLaunchError {
        #[from]
        err: EditorLaunchError,
    },
    #[error("error writing output")]
    WriteOutput {
        #[source]
        err: std::io::Error,
    },
    #[error("test run failed")]
    TestRunFailed,
    #[error("run incomplete")]
    IncompleteRun { unresolved: usize },
}

impl ExpectedError {
    pub(crate) fn write_output(err: std::io::Error) -> Self {
        Self::WriteOutput { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirInvalid { .. }
            | Self::ConfigParseError { .. }
            | Self::DiscoveryError { .. }
            | Self::ReadSpecError { .. }
            | Self::ReadLogError { .. }
            | Self::SpecNotFound { .. }
            | Self::SourceLocationParseError { .. }
            | Self::TokioRuntimeCreateError { .. } => SpecwatchExitCode::SETUP_ERROR,
            Self::SpawnError { .. } | Self::EditorLaunchError { .. } => {
                SpecwatchExitCode::SPAWN_FAILED
            }
            Self::WriteOutput { .. } => SpecwatchExitCode::WRITE_OUTPUT_ERROR,
            Self::TestRunFailed => SpecwatchExitCode::TEST_RUN_FAILED,
            Self::IncompleteRun { .. } => SpecwatchExitCode::INCOMPLETE_RUN,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirInvalid { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse specwatch config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::DiscoveryError { err } => {
                error!(
                    "failed to scan `{}` for spec files",
                    err.dir().style(styles.bold)
                );
                err.source()
            }
            Self::ReadSpecError { err } => {
                error!("failed to read spec file `{}`", err.path().style(styles.bold));
                err.source()
            }
            Self::ReadLogError { path, err } => {
                error!("failed to read log `{}`", path.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::SpecNotFound { path } => {
                error!("spec file `{}` not found", path.style(styles.bold));
                None
            }
            Self::SourceLocationParseError { err } => {
                error!("{err}");
                None
            }
            Self::TokioRuntimeCreateError { err } => {
                error!("failed to create Tokio runtime");
                Some(err as &dyn Error)
            }
            Self::SpawnError { err } => {
                match err {
                    SpawnError::Spawn { command, .. } => {
                        error!("failed to start `{}`", command.style(styles.bold));
                    }
                    other => error!("{other}"),
                }
                err.source()
            }
            Self::EditorLaunchError { err } => {
                error!("{err}");
                err.source()
            }
            Self::WriteOutput { err } => {
                error!("failed to write output");
                Some(err as &dyn Error)
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
            Self::IncompleteRun { unresolved } => {
                error!(
                    "run ended before {} {} reported a result",
                    unresolved.style(styles.bold),
                    if *unresolved == 1 { "test" } else { "tests" },
                );
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
