// Copyright (c) The specwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of spec files in a project.

use crate::{
    config::DiscoveryConfig,
    errors::{DiscoveryError, ReadSpecError},
    title::TitleExtractor,
};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use std::{collections::BTreeMap, fs};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// The folder name used for specs directly under the project root.
pub const ROOT_FOLDER: &str = "(root)";

/// A spec file found in the project.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecFile {
    /// The file name.
    pub name: String,

    /// The path relative to the project root.
    pub relative_path: Utf8PathBuf,

    /// The absolute path.
    pub absolute_path: Utf8PathBuf,

    /// The suite title declared in the file, or the file name if none was found.
    pub title: String,
}

impl SpecFile {
    /// Returns the folder the spec is grouped under.
    pub fn folder(&self) -> &str {
        match self.relative_path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent.as_str(),
            _ => ROOT_FOLDER,
        }
    }
}

/// Specs within a single folder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecFolder<'a> {
    /// The folder relative to the project root, or [`ROOT_FOLDER`].
    pub name: &'a str,

    /// The specs in this folder, in discovery order.
    pub specs: Vec<&'a SpecFile>,
}

/// Scans the configured test directories under `project_root` for spec files.
///
/// Test directories that don't exist are skipped. Specs found through more than one test
/// directory are only returned once.
pub fn scan_for_specs(
    project_root: &Utf8Path,
    config: &DiscoveryConfig,
    extractor: &TitleExtractor,
) -> Result<Vec<SpecFile>, DiscoveryError> {
    let mut specs = Vec::new();

    for test_dir in &config.test_dirs {
        let dir = project_root.join(test_dir);
        if !dir.is_dir() {
            debug!("test directory `{dir}` not found, skipping");
            continue;
        }

        let walker = WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir()
                    && entry.depth() > 0
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| config.skip_dirs.iter().any(|skip| skip == name)))
            });

        for entry in walker {
            let entry = entry.map_err(|err| DiscoveryError::new(&dir, err))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(path) = Utf8Path::from_path(entry.path()) else {
                debug!("skipping non-UTF-8 path {}", entry.path().display());
                continue;
            };
            let Some(name) = path.file_name() else {
                continue;
            };
            if !config.file_pattern.is_match(name) {
                continue;
            }

            specs.push(make_spec_file(project_root, path, name, extractor));
        }
    }

    Ok(specs
        .into_iter()
        .unique_by(|spec| spec.absolute_path.clone())
        .collect())
}

fn make_spec_file(
    project_root: &Utf8Path,
    path: &Utf8Path,
    name: &str,
    extractor: &TitleExtractor,
) -> SpecFile {
    let relative_path = path
        .strip_prefix(project_root)
        .map_or_else(|_| path.to_owned(), Utf8Path::to_owned);

    let title = match read_spec_source(path) {
        Ok(source) => extractor.extract_suite_title(&source),
        Err(error) => {
            warn!("{error}, using the file name as title");
            None
        }
    };

    SpecFile {
        name: name.to_owned(),
        relative_path,
        absolute_path: path.to_owned(),
        title: title.unwrap_or_else(|| name.to_owned()),
    }
}

/// Groups specs by folder. Folders are sorted by name.
pub fn group_by_folder(specs: &[SpecFile]) -> Vec<SpecFolder<'_>> {
    let mut folders: BTreeMap<&str, Vec<&SpecFile>> = BTreeMap::new();
    for spec in specs {
        folders.entry(spec.folder()).or_default().push(spec);
    }
    folders
        .into_iter()
        .map(|(name, specs)| SpecFolder { name, specs })
        .collect()
}

/// Reads the source text of a spec file.
pub fn read_spec_source(path: &Utf8Path) -> Result<String, ReadSpecError> {
    fs::read_to_string(path).map_err(|err| ReadSpecError::new(path, err))
}
