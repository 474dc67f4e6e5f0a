//! Environment-driven service configuration.

use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_MODEL_PATH: &str = "../models/dropout_model_final.json";
pub const DEFAULT_FEATURES_PATH: &str = "../models/model_features.pkl";

const BIND_VAR: &str = "DROPOUT_API_BIND";
const MODEL_PATH_VAR: &str = "DROPOUT_API_MODEL_PATH";
const FEATURES_PATH_VAR: &str = "DROPOUT_API_FEATURES_PATH";
const WORKERS_VAR: &str = "DROPOUT_API_WORKERS";

/// Where the startup hook looks for each artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub features: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            model: PathBuf::from(DEFAULT_MODEL_PATH),
            features: PathBuf::from(DEFAULT_FEATURES_PATH),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    /// `None` keeps actix-web's default worker count.
    pub workers: Option<usize>,
    pub artifacts: ArtifactPaths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            workers: None,
            artifacts: ArtifactPaths::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from an arbitrary variable lookup. Unset variables
    /// fall back to the defaults; set-but-empty ones are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind = non_empty(BIND_VAR, lookup(BIND_VAR))?.unwrap_or(defaults.bind);
        let model = non_empty(MODEL_PATH_VAR, lookup(MODEL_PATH_VAR))?
            .map(PathBuf::from)
            .unwrap_or(defaults.artifacts.model);
        let features = non_empty(FEATURES_PATH_VAR, lookup(FEATURES_PATH_VAR))?
            .map(PathBuf::from)
            .unwrap_or(defaults.artifacts.features);

        let workers = match non_empty(WORKERS_VAR, lookup(WORKERS_VAR))? {
            None => None,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        var: WORKERS_VAR,
                        value: raw,
                        reason: "must be at least 1",
                    })
                }
                Ok(n) => Some(n),
                Err(_) => {
                    return Err(ConfigError::Invalid {
                        var: WORKERS_VAR,
                        value: raw,
                        reason: "not a positive integer",
                    })
                }
            },
        };

        Ok(Self {
            bind,
            workers,
            artifacts: ArtifactPaths { model, features },
        })
    }
}

fn non_empty(var: &'static str, value: Option<String>) -> Result<Option<String>, ConfigError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ConfigError::Empty { var }),
        other => Ok(other),
    }
}
