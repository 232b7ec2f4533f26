//! Error types for OpenAI client.

use thiserror::Error;

/// Result type for OpenAI client operations.
pub type Result<T> = std::result::Result<T, OpenAIError>;

/// OpenAI client errors.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Configuration error (missing API key, invalid settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Request did not complete within the client timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// API error (non-2xx response, rate limit, invalid request)
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Parse error (invalid JSON, unexpected response format)
    #[error("Parse error: {0}")]
    Parse(String),
}

impl OpenAIError {
    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            OpenAIError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Rate limits (429), request timeouts (408), server errors (5xx) and
    /// transport failures are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            OpenAIError::Network(_) | OpenAIError::Timeout(_) => true,
            OpenAIError::Api { status, .. } => {
                *status == 429 || *status == 408 || (500..600).contains(status)
            }
            OpenAIError::Config(_) | OpenAIError::Parse(_) => false,
        }
    }

    /// Whether the failure is an authentication/authorization problem.
    pub fn is_auth(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> OpenAIError {
        OpenAIError::Api {
            status,
            message: "boom".into(),
        }
    }

    #[test]
    fn test_transient_statuses() {
        assert!(api(429).is_transient());
        assert!(api(408).is_transient());
        assert!(api(503).is_transient());
        assert!(OpenAIError::Network("reset".into()).is_transient());
        assert!(OpenAIError::Timeout("60s".into()).is_transient());
    }

    #[test]
    fn test_non_transient_statuses() {
        assert!(!api(400).is_transient());
        assert!(!api(401).is_transient());
        assert!(!OpenAIError::Parse("bad".into()).is_transient());
        assert!(api(401).is_auth());
        assert!(api(403).is_auth());
        assert!(!api(500).is_auth());
    }
}
