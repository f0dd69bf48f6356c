// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for specwatch.
//!
//! The configuration is layered: the default config embedded in this crate is loaded first, then
//! either `.config/specwatch.toml` in the project root (if it exists) or a file passed in
//! explicitly.

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use itertools::Itertools;
use regex::Regex;
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};
use tracing::warn;

/// Overall configuration for specwatch.
///
/// This is the root data structure for specwatch configuration. Most runs will read from
/// `.config/specwatch.toml` in the project root.
#[derive(Clone, Debug)]
pub struct SpecwatchConfig {
    project_root: Utf8PathBuf,
    discovery: DiscoveryConfig,
    extract: ExtractConfig,
    output: OutputConfig,
    runner: RunnerConfig,
    editor: EditorConfig,
}

impl SpecwatchConfig {
    /// The default location of the config within the project root.
    pub const CONFIG_PATH: &'static str = ".config/specwatch.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the specwatch config from the given file, or if not specified from
    /// `.config/specwatch.toml` in the project root.
    ///
    /// Unknown keys are reported as warnings rather than errors.
    pub fn from_sources(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let project_root = project_root.into();
        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let (deserialized, unknown) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        if !unknown.is_empty() {
            warn!(
                "ignoring unknown configuration keys in `{config_file}`: {}",
                unknown.iter().join(", ")
            );
        }

        deserialized
            .into_config(project_root)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))
    }

    /// Returns the default specwatch config.
    pub fn default_config(project_root: impl Into<Utf8PathBuf>) -> Self {
        let (deserialized, unknown) =
            Self::build_and_deserialize_config(&Self::make_default_config())
                .unwrap_or_else(|err| panic!("default config is always valid: {err}"));

        // The default config is embedded in this binary, so any unknown keys are a bug.
        if !unknown.is_empty() {
            panic!(
                "found unknown keys in default config: {}",
                unknown.iter().join(", ")
            );
        }

        deserialized
            .into_config(project_root.into())
            .unwrap_or_else(|err| panic!("default config is always valid: {err}"))
    }

    /// Returns the project root this config applies to.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Returns the discovery configuration.
    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    /// Returns the title extraction configuration.
    pub fn extract(&self) -> &ExtractConfig {
        &self.extract
    }

    /// Returns the configuration used to interpret runner output.
    pub fn output(&self) -> &OutputConfig {
        &self.output
    }

    /// Returns the runner process configuration.
    pub fn runner(&self) -> &RunnerConfig {
        &self.runner
    }

    /// Returns the editor configuration.
    pub fn editor(&self) -> &EditorConfig {
        &self.editor
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(SpecwatchConfigDeserialize, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: SpecwatchConfigDeserialize = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| {
                // Both serde_path_to_error and the config crate report the key. Drop the key
                // from the config error.
                let path = error.path().clone();
                let config_error = error.into_inner();
                let error = match config_error {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// Where to look for spec files.
#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    /// Directories, relative to the project root, that are searched for spec files.
    pub test_dirs: Vec<Utf8PathBuf>,

    /// Directory names that are never descended into.
    pub skip_dirs: Vec<String>,

    /// Matched against file names to decide whether a file is a spec.
    pub file_pattern: Regex,
}

/// Names of the functions that declare suites and test cases.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractConfig {
    /// Suite declaration functions, e.g. `describe`.
    pub suite_functions: Vec<String>,

    /// Test case declaration functions, e.g. `it`.
    pub case_functions: Vec<String>,
}

/// How runner output is interpreted.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// The name of the dependency vendoring directory, e.g. `node_modules`.
    pub vendor_dir: String,

    /// Extensions of source files that may be linked from the error log.
    pub source_extensions: Vec<String>,

    /// Markers printed before the title of a passing test.
    pub pass_markers: Vec<String>,

    /// Markers printed before the title of a failing test.
    pub fail_markers: Vec<String>,
}

/// How spec files are run.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunnerConfig {
    /// If this file exists in the project root, `command` is run. Otherwise the run is simulated.
    pub detect_file: Utf8PathBuf,

    /// The runner command. The spec path is appended as the last argument.
    pub command: Vec<String>,

    /// How long a simulated run takes.
    #[serde(with = "humantime_serde")]
    pub simulate_delay: Duration,

    /// Prepended to every line the runner writes to stderr. Empty to leave stderr unmarked.
    pub stderr_prefix: String,
}

/// How source locations are opened.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EditorConfig {
    /// The editor command. The `path:line:col` location is appended as the last argument.
    pub command: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SpecwatchConfigDeserialize {
    discovery: DiscoveryConfigDeserialize,
    extract: ExtractConfig,
    output: OutputConfig,
    runner: RunnerConfig,
    editor: EditorConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DiscoveryConfigDeserialize {
    test_dirs: Vec<Utf8PathBuf>,
    skip_dirs: Vec<String>,
    file_pattern: String,
}

impl SpecwatchConfigDeserialize {
    fn into_config(
        self,
        project_root: Utf8PathBuf,
    ) -> Result<SpecwatchConfig, ConfigParseErrorKind> {
        let file_pattern = Regex::new(&self.discovery.file_pattern).map_err(|err| {
            ConfigParseErrorKind::InvalidRegex {
                key: "discovery.file-pattern",
                err,
            }
        })?;

        let non_empty = [
            ("extract.suite-functions", self.extract.suite_functions.len()),
            ("extract.case-functions", self.extract.case_functions.len()),
            ("output.source-extensions", self.output.source_extensions.len()),
            ("output.pass-markers", self.output.pass_markers.len()),
            ("output.fail-markers", self.output.fail_markers.len()),
            ("runner.command", self.runner.command.len()),
            ("editor.command", self.editor.command.len()),
        ];
        if let Some((key, _)) = non_empty.into_iter().find(|(_, len)| *len == 0) {
            return Err(ConfigParseErrorKind::EmptyList { key });
        }

        // These entries are embedded in regexes, where a blank alternative matches anything.
        let no_blanks = [
            ("extract.suite-functions", &self.extract.suite_functions),
            ("extract.case-functions", &self.extract.case_functions),
            ("output.source-extensions", &self.output.source_extensions),
            ("output.pass-markers", &self.output.pass_markers),
            ("output.fail-markers", &self.output.fail_markers),
        ];
        if let Some((key, _)) = no_blanks
            .into_iter()
            .find(|(_, entries)| entries.iter().any(|entry| entry.trim().is_empty()))
        {
            return Err(ConfigParseErrorKind::BlankEntry { key });
        }

        Ok(SpecwatchConfig {
            project_root,
            discovery: DiscoveryConfig {
                test_dirs: self.discovery.test_dirs,
                skip_dirs: self.discovery.skip_dirs,
                file_pattern,
            },
            extract: self.extract,
            output: self.output,
            runner: self.runner,
            editor: self.editor,
        })
    }
}
