//! Error types for Solo.
//!
//! These are operational failures of the host process (bad configuration,
//! unreadable files, a stopped arbiter). Failures a remote caller sees travel
//! as [`crate::protocol::RpcError`] instead.

use thiserror::Error;

/// Main error type for the Solo library.
#[derive(Debug, Error)]
pub enum SoloError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("TLS error: {message}")]
    Tls { message: String },

    #[error("Resource is busy")]
    ResourceBusy,

    #[error("Access arbiter is no longer running")]
    ArbiterUnavailable,
}

/// Result type alias for Solo operations.
pub type Result<T> = std::result::Result<T, SoloError>;

impl From<std::io::Error> for SoloError {
    fn from(err: std::io::Error) -> Self {
        SoloError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for SoloError {
    fn from(err: serde_json::Error) -> Self {
        SoloError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl SoloError {
    /// Whether a client may simply try again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SoloError::ResourceBusy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SoloError::Config {
            message: "lease duration must be greater than zero".into(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: lease duration must be greater than zero"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SoloError::ResourceBusy.is_retryable());
        assert!(!SoloError::ArbiterUnavailable.is_retryable());
    }

    #[test]
    fn test_json_conversion() {
        let err: SoloError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, SoloError::Json { .. }));
    }
}
