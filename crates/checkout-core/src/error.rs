//! Error Types

use thiserror::Error;

/// Result type alias for webhook handling
pub type Result<T> = std::result::Result<T, HookError>;

/// Webhook handling errors
#[derive(Error, Debug)]
pub enum HookError {
    /// Event payload did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl HookError {
    /// Whether redelivering the same event could succeed
    ///
    /// A payload that does not parse will not parse on the next delivery.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_payload_is_permanent() {
        assert!(!HookError::Parse("no id".into()).is_retryable());
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!HookError::from(json).is_retryable());
        assert!(HookError::Other("db down".into()).is_retryable());
    }
}
