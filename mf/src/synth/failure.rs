//! Row-scoped synthesis failures

use std::time::Duration;
use thiserror::Error;

use crate::llm::LlmError;

/// Why a candidate ended up without SQL logic
///
/// Every variant is confined to its own row; none of them stops the batch.
#[derive(Debug, Error)]
pub enum SynthesisFailure {
    #[error("no metadata for {source_table}.{source_field}")]
    Resolution { source_table: String, source_field: String },

    #[error("prompt rendering failed: {0}")]
    Prompt(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("not sent for synthesis")]
    Skipped,
}

impl SynthesisFailure {
    /// Short stable label for summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution { .. } => "resolution",
            Self::Prompt(_) => "prompt",
            Self::Transport(_) => "transport",
            Self::Authentication(_) => "authentication",
            Self::RateLimited { .. } => "rate-limited",
            Self::Api { .. } => "api",
            Self::MalformedResponse(_) => "malformed-response",
            Self::Skipped => "skipped",
        }
    }
}

impl From<LlmError> for SynthesisFailure {
    fn from(err: LlmError) -> Self {
        if err.is_auth() {
            return Self::Authentication(err.to_string());
        }
        match err {
            LlmError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            LlmError::ApiError { status, message } => Self::Api { status, message },
            LlmError::Network(e) => Self::Transport(e.to_string()),
            LlmError::Timeout(d) => Self::Transport(format!("timed out after {:?}", d)),
            LlmError::Config(msg) => Self::Transport(msg),
            LlmError::InvalidResponse(msg) => Self::MalformedResponse(msg),
            LlmError::Json(e) => Self::MalformedResponse(e.to_string()),
        }
    }
}
