//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the reasoning engine
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: set the {0} environment variable")]
    MissingApiKey(String),

    #[error("Unknown LLM provider: '{0}'. Supported: openai, anthropic")]
    UnknownProvider(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Check if this is a rate limit error
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::Network(_) => true,
            LlmError::InvalidResponse(_)
            | LlmError::MissingApiKey(_)
            | LlmError::UnknownProvider(_)
            | LlmError::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_rate_limit() {
        let err = LlmError::RateLimited {
            retry_after: Duration::from_secs(60),
        };
        assert!(err.is_rate_limit());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_is_retryable() {
        assert!(
            LlmError::ApiError {
                status: 502,
                message: "Bad gateway".to_string()
            }
            .is_retryable()
        );
        assert!(
            !LlmError::ApiError {
                status: 400,
                message: "Bad request".to_string()
            }
            .is_retryable()
        );
        assert!(!LlmError::InvalidResponse("Bad JSON".to_string()).is_retryable());
        assert!(!LlmError::MissingApiKey("OPENAI_API_KEY".to_string()).is_retryable());
    }

    #[test]
    fn test_missing_api_key_message() {
        let msg = LlmError::MissingApiKey("OPENAI_API_KEY".to_string()).to_string();
        assert!(msg.contains("OPENAI_API_KEY"));
    }
}
