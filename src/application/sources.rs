//! Source discovery and best-effort per-file reads.

use std::{
    fs,
    path::{Path, PathBuf},
};

use metrics::counter;
use tracing::warn;

use crate::{
    application::error::{CompileError, SkipReason},
    infra::artifact::modified_secs,
};

/// Extension (without the dot) that marks a stylesheet source.
pub const STYLESHEET_EXTENSION: &str = "css";

/// Result of probing one source file.
#[derive(Debug)]
pub struct FileOutcome<T> {
    pub path: PathBuf,
    pub result: Result<T, SkipReason>,
}

/// A source left out of a batch, kept for the compile report.
#[derive(Debug)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Stylesheets found directly inside a directory, sorted by file name.
#[derive(Debug, Clone)]
pub struct SourceSet {
    paths: Vec<PathBuf>,
}

impl SourceSet {
    pub fn discover(directory: &Path) -> Result<Self, CompileError> {
        let entries = fs::read_dir(directory)
            .map_err(|err| CompileError::not_found(directory, Some(err)))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| CompileError::not_found(directory, Some(err)))?;
            let path = entry.path();
            if is_stylesheet(&path) {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(CompileError::not_found(directory, None));
        }

        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn stat_mtimes(&self) -> Vec<FileOutcome<u64>> {
        self.paths
            .iter()
            .map(|path| FileOutcome {
                path: path.clone(),
                result: source_mtime(path),
            })
            .collect()
    }

    pub fn read_contents(&self) -> Vec<FileOutcome<Vec<u8>>> {
        self.paths
            .iter()
            .map(|path| FileOutcome {
                path: path.clone(),
                result: read_source(path),
            })
            .collect()
    }
}

/// Keep successful values, logging and recording every skipped file.
pub fn fold_outcomes<T>(outcomes: Vec<FileOutcome<T>>, skipped: &mut Vec<Skipped>) -> Vec<T> {
    let mut values = Vec::with_capacity(outcomes.len());
    for FileOutcome { path, result } in outcomes {
        match result {
            Ok(value) => values.push(value),
            Err(reason) => {
                warn!(
                    target = "stylecache::sources",
                    path = %path.display(),
                    reason = %reason,
                    "Skipping stylesheet source"
                );
                counter!("stylecache_skipped_file_total").increment(1);
                skipped.push(Skipped { path, reason });
            }
        }
    }
    values
}

/// Newest modification time across the readable sources, or 0.
pub fn freshness_signal(mtimes: &[u64]) -> u64 {
    mtimes.iter().copied().max().unwrap_or(0)
}

fn is_stylesheet(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_none_or(|name| name.starts_with('.'));
    !hidden
        && path
            .extension()
            .is_some_and(|ext| ext == STYLESHEET_EXTENSION)
}

fn source_mtime(path: &Path) -> Result<u64, SkipReason> {
    let metadata = fs::metadata(path).map_err(SkipReason::Metadata)?;
    if !metadata.is_file() {
        return Err(SkipReason::NotAFile);
    }
    modified_secs(&metadata).map_err(SkipReason::Metadata)
}

fn read_source(path: &Path) -> Result<Vec<u8>, SkipReason> {
    fs::read(path).map_err(SkipReason::Read)
}
