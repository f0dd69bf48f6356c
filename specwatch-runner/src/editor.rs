// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Opening source locations in an editor.

use crate::{config::EditorConfig, errors::EditorLaunchError, location::SourceLocation};
use tracing::{debug, info};

/// Launches the configured editor at source locations.
#[derive(Clone, Debug)]
pub struct EditorLauncher {
    command: Vec<String>,
}

impl EditorLauncher {
    /// Creates a new launcher.
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            command: config.command.clone(),
        }
    }

    /// Returns the arguments, program first, used to open `location`.
    ///
    /// Double quotes are stripped from the location before it is passed on.
    pub fn args(&self, location: &SourceLocation) -> Vec<String> {
        let location = location.to_string().replace('"', "");
        self.command.iter().cloned().chain([location]).collect()
    }

    /// Converts the command for `location` to a [`duct::Expression`].
    pub fn to_expression(&self, location: &SourceLocation) -> duct::Expression {
        let args = self.args(location);
        editor_expression(&args)
            .stdin_null()
            .stdout_null()
            .stderr_null()
            .unchecked()
    }

    /// Opens `location` in the editor.
    ///
    /// The editor is not waited for: it is reaped on a background thread so that it doesn't
    /// linger as a zombie.
    pub fn open_at(&self, location: &SourceLocation) -> Result<(), EditorLaunchError> {
        let expression = self.to_expression(location);
        info!("opening `{location}` in the editor");
        debug!("executing command: {expression:?}");

        let handle = expression
            .start()
            .map_err(|err| EditorLaunchError::new(self.args(location).join(" "), err))?;
        std::thread::spawn(move || {
            if let Err(error) = handle.wait() {
                debug!("error waiting for editor: {error}");
            }
        });
        Ok(())
    }
}

// `code` and friends are batch files on Windows.
#[cfg(windows)]
fn editor_expression(args: &[String]) -> duct::Expression {
    duct::cmd("cmd", ["/C"].into_iter().chain(args.iter().map(String::as_str)))
}

#[cfg(not(windows))]
fn editor_expression(args: &[String]) -> duct::Expression {
    duct::cmd(args[0].as_str(), args[1..].iter().map(String::as_str))
}
