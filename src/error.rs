//! Error types for artifact loading, configuration and request serving.

use std::io;
use std::path::{Path, PathBuf};

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::artifacts::ArtifactKind;

/// Failure to load one artifact from disk.
///
/// Every variant carries the path so a startup log line is enough to
/// diagnose the problem without reproducing it.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed pickle in {}: {source}", path.display())]
    Pickle {
        path: PathBuf,
        #[source]
        source: serde_pickle::Error,
    },

    #[error("invalid artifact in {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

impl LoadError {
    /// Classifies an I/O error raised while opening or reading `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound { path },
            io::ErrorKind::PermissionDenied => LoadError::PermissionDenied { path },
            _ => LoadError::Io { path, source: err },
        }
    }

    /// Short machine-friendly label, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::NotFound { .. } => "not_found",
            LoadError::PermissionDenied { .. } => "permission_denied",
            LoadError::Io { .. } => "io",
            LoadError::Json { .. } | LoadError::Pickle { .. } => "deserialize",
            LoadError::Invalid { .. } => "invalid",
        }
    }
}

/// Bad environment configuration. Aborts startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must not be empty")]
    Empty { var: &'static str },

    #[error("{var}={value:?} is not valid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Errors a request handler can surface to HTTP callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service not ready: missing {}", join_kinds(missing))]
    NotReady { missing: Vec<ArtifactKind> },

    #[error("expected {expected} features per row, got {actual}")]
    FeatureShape { expected: usize, actual: usize },

    #[error("model cannot be evaluated: {reason}")]
    UnsupportedModel { reason: String },
}

fn join_kinds(kinds: &[ArtifactKind]) -> String {
    kinds
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotReady { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::FeatureShape { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::UnsupportedModel { .. } => StatusCode::NOT_IMPLEMENTED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            detail: self.to_string(),
        })
    }
}
