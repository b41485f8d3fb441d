use std::{error::Error as StdError, io, path::PathBuf};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::infra::error::InfraError;

/// Fatal outcomes of a single compile invocation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("stylesheet directory does not exist: {}", path.display())]
    Config { path: PathBuf },
    #[error("no stylesheet files found in directory: {}", directory.display())]
    NotFound {
        directory: PathBuf,
        #[source]
        source: Option<io::Error>,
    },
    #[error("generated stylesheet is empty {stage}")]
    EmptyContent { stage: EmptyStage },
    #[error("failed to persist stylesheet cache `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Which regeneration stage came up empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyStage {
    Concatenation,
    Minification,
}

impl std::fmt::Display for EmptyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyStage::Concatenation => f.write_str("after concatenation"),
            EmptyStage::Minification => f.write_str("after trimming"),
        }
    }
}

impl CompileError {
    pub fn not_found(directory: impl Into<PathBuf>, source: Option<io::Error>) -> Self {
        Self::NotFound {
            directory: directory.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            CompileError::Config { .. } => "Stylesheet service misconfigured",
            CompileError::NotFound { .. } => "No stylesheets available",
            CompileError::EmptyContent { .. } => "Stylesheet could not be generated",
            CompileError::Write { .. } => "Stylesheet cache could not be written",
        }
    }
}

/// Why a single source file was left out of a batch.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("not a file")]
    NotAFile,
    #[error("error retrieving mtime: {0}")]
    Metadata(#[source] io::Error),
    #[error("error reading stylesheet: {0}")]
    Read(#[source] io::Error),
}

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<CompileError> for HttpError {
    fn from(error: CompileError) -> Self {
        HttpError::from_error(
            "infra::http::compile_error_to_http_error",
            StatusCode::INTERNAL_SERVER_ERROR,
            error.public_message(),
            &error,
        )
    }
}

/// Top-level error for the binary entry points.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_collects_source_chain() {
        let error = CompileError::write(
            "/srv/css/style.cache",
            io::Error::new(io::ErrorKind::PermissionDenied, "read-only filesystem"),
        );
        let report = ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &error);

        assert_eq!(report.messages.len(), 2);
        assert!(report.messages[0].contains("/srv/css/style.cache"));
        assert_eq!(report.messages[1], "read-only filesystem");
    }

    #[test]
    fn compile_errors_map_to_server_errors() {
        let errors = [
            CompileError::Config {
                path: PathBuf::from("missing"),
            },
            CompileError::not_found("css", None),
            CompileError::EmptyContent {
                stage: EmptyStage::Minification,
            },
        ];

        for error in errors {
            let http = HttpError::from(error);
            assert_eq!(http.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn empty_stage_is_named_in_message() {
        let error = CompileError::EmptyContent {
            stage: EmptyStage::Concatenation,
        };
        assert_eq!(
            error.to_string(),
            "generated stylesheet is empty after concatenation"
        );
    }
}
