use serde::Serialize;

pub const STATUS_ACTIVE: &str = "active";

/// Body of `GET /health`.
///
/// `status` only says the process is serving. Readiness is read from the two
/// flags.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub features_loaded: bool,
}
