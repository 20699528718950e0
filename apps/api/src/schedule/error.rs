use thiserror::Error;

use crate::llm_client::LlmError;

/// Failure of a single extraction path (official or internal). Never crosses
/// into the reconciler: callers absorb it and reconcile whatever succeeded.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Missing or rejected credentials. Fatal, no fallback.
    #[error("Structuring endpoint is not configured: {0}")]
    Configuration(String),

    /// Upstream quota exhausted. Extractors answer this with a demo session.
    #[error("Upstream quota exhausted: {0}")]
    UpstreamQuota(String),

    /// Upstream rate limit. The user must resubmit; nothing is retried here.
    #[error("Upstream rate limit reached: {0}")]
    UpstreamRateLimit(String),

    /// Non-JSON or schema-violating response.
    #[error("Malformed structuring response: {0}")]
    MalformedResponse(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Extraction timed out after {0}s")]
    Timeout(u64),
}

impl ExtractionError {
    /// Stable machine-readable code, surfaced in partial-failure details.
    pub fn code(&self) -> &'static str {
        match self {
            ExtractionError::Configuration(_) => "CONFIGURATION_ERROR",
            ExtractionError::UpstreamQuota(_) => "UPSTREAM_QUOTA",
            ExtractionError::UpstreamRateLimit(_) => "UPSTREAM_RATE_LIMIT",
            ExtractionError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            ExtractionError::Upstream(_) => "UPSTREAM_ERROR",
            ExtractionError::Timeout(_) => "TIMEOUT",
        }
    }
}

impl From<LlmError> for ExtractionError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Configuration(msg) => ExtractionError::Configuration(msg),
            LlmError::QuotaExhausted(msg) => ExtractionError::UpstreamQuota(msg),
            LlmError::RateLimited(msg) => ExtractionError::UpstreamRateLimit(msg),
            LlmError::Parse(e) => ExtractionError::MalformedResponse(e.to_string()),
            LlmError::EmptyContent => {
                ExtractionError::MalformedResponse("empty completion".to_string())
            }
            e @ (LlmError::Http(_) | LlmError::Api { .. }) => ExtractionError::Upstream(e.to_string()),
        }
    }
}
