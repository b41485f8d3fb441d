//! Stylesheet cache compiler.
//!
//! Decides whether `style.cache` is stale relative to the `*.css` sources of a
//! directory, regenerates it when needed and builds the HTTP response.

use std::{
    io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use axum::http::HeaderMap;
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::{
    application::{
        error::{CompileError, EmptyStage},
        minify::minify,
        response::StyleResponse,
        sources::{Skipped, SourceSet, fold_outcomes, freshness_signal},
    },
    infra::artifact::CacheArtifact,
};

/// Compile `directory` and answer a request carrying `request` headers.
pub fn compile(
    directory: impl Into<PathBuf>,
    request: &HeaderMap,
) -> Result<StyleResponse, CompileError> {
    CacheCompiler::new(directory)?.process(request)
}

/// How the served stylesheet was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// The artifact was fresh and read back unchanged.
    Hit,
    /// Sources were newer than the artifact.
    Stale,
    /// The artifact looked fresh but could not be read.
    CacheUnreadable,
}

impl CacheOutcome {
    pub fn regenerated(self) -> bool {
        !matches!(self, CacheOutcome::Hit)
    }

    fn as_str(self) -> &'static str {
        match self {
            CacheOutcome::Hit => "hit",
            CacheOutcome::Stale => "stale",
            CacheOutcome::CacheUnreadable => "cache_unreadable",
        }
    }
}

#[derive(Debug)]
pub struct CompileReport {
    pub outcome: CacheOutcome,
    pub sources: usize,
    pub skipped: Vec<Skipped>,
}

/// Stylesheet bytes together with the freshness signal used for validators.
#[derive(Debug)]
pub struct CompiledStylesheet {
    pub css: Vec<u8>,
    pub last_modified: u64,
    pub report: CompileReport,
}

#[derive(Debug, Clone)]
pub struct CacheCompiler {
    directory: PathBuf,
    artifact: CacheArtifact,
}

impl CacheCompiler {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, CompileError> {
        let directory = directory.into();
        if !directory.is_dir() {
            return Err(CompileError::Config { path: directory });
        }
        let artifact = CacheArtifact::in_directory(&directory);
        Ok(Self {
            directory,
            artifact,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn artifact(&self) -> &CacheArtifact {
        &self.artifact
    }

    pub fn process(&self, request: &HeaderMap) -> Result<StyleResponse, CompileError> {
        self.process_at(request, SystemTime::now())
    }

    /// Like [`CacheCompiler::process`] with an explicit clock for `Expires`.
    pub fn process_at(
        &self,
        request: &HeaderMap,
        now: SystemTime,
    ) -> Result<StyleResponse, CompileError> {
        let stylesheet = self.build()?;
        Ok(StyleResponse::for_stylesheet(
            stylesheet.css,
            stylesheet.last_modified,
            request,
            now,
        ))
    }

    /// Bring the artifact up to date and return the bytes to serve.
    #[instrument(skip(self), fields(directory = %self.directory.display()))]
    pub fn build(&self) -> Result<CompiledStylesheet, CompileError> {
        let sources = SourceSet::discover(&self.directory)?;
        let mut skipped = Vec::new();
        let mtimes = fold_outcomes(sources.stat_mtimes(), &mut skipped);
        let signal = freshness_signal(&mtimes);
        let cached_at = self.artifact.modified_secs();

        let (outcome, css, last_modified) = if signal > cached_at {
            debug!(signal, cached_at, "stylesheet cache is stale");
            let (css, written_at) = self.regenerate(&sources, &mut skipped)?;
            (CacheOutcome::Stale, css, written_at)
        } else {
            self.serve_cached(self.artifact.read(), signal, &sources, &mut skipped)?
        };

        counter!("stylecache_compile_total", "outcome" => outcome.as_str()).increment(1);
        if outcome.regenerated() {
            info!(
                outcome = outcome.as_str(),
                bytes = css.len(),
                sources = sources.len(),
                skipped = skipped.len(),
                "stylesheet cache regenerated"
            );
        }

        Ok(CompiledStylesheet {
            css,
            last_modified,
            report: CompileReport {
                outcome,
                sources: sources.len(),
                skipped,
            },
        })
    }

    /// Use the artifact read back for a fresh cache, regenerating when it failed.
    fn serve_cached(
        &self,
        cached: io::Result<Vec<u8>>,
        signal: u64,
        sources: &SourceSet,
        skipped: &mut Vec<Skipped>,
    ) -> Result<(CacheOutcome, Vec<u8>, u64), CompileError> {
        match cached {
            Ok(css) => Ok((CacheOutcome::Hit, css, signal)),
            Err(err) => {
                warn!(
                    path = %self.artifact.path().display(),
                    error = %err,
                    "Error reading cache file, regenerating stylesheet"
                );
                let (css, written_at) = self.regenerate(sources, skipped)?;
                Ok((CacheOutcome::CacheUnreadable, css, written_at))
            }
        }
    }

    fn regenerate(
        &self,
        sources: &SourceSet,
        skipped: &mut Vec<Skipped>,
    ) -> Result<(Vec<u8>, u64), CompileError> {
        let contents = fold_outcomes(sources.read_contents(), skipped);
        let concatenated = contents.concat();
        if concatenated.is_empty() {
            return Err(CompileError::EmptyContent {
                stage: EmptyStage::Concatenation,
            });
        }

        let css = minify(&concatenated);
        if css.trim_ascii().is_empty() {
            return Err(CompileError::EmptyContent {
                stage: EmptyStage::Minification,
            });
        }

        let path = self.artifact.path();
        self.artifact
            .write_locked(&css)
            .map_err(|err| CompileError::write(path, err))?;
        let written_at = self
            .artifact
            .written_secs()
            .map_err(|err| CompileError::write(path, err))?;

        Ok((css, written_at))
    }
}
