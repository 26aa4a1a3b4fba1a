//! Key service error types

use thiserror::Error;
use vaultline_common::config::ConfigError;
use vaultline_common::error::{ErrorClassification, ErrorSeverity};

/// Key service error type
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key path '{path}' is malformed: {message}")]
    MalformedPath { path: String, message: String },

    #[error("key not found for path '{0}'")]
    NotFound(String),

    #[error("no key provider supports path '{0}'")]
    Unsupported(String),

    #[error("keystore '{name}' could not be loaded: {message}")]
    KeystoreLoad { name: String, message: String },

    #[error("key material is invalid: {0}")]
    InvalidMaterial(String),

    #[error("no key frame is open for this resolution (frame required)")]
    FrameRequired,

    #[error("a key frame is already open for this scope")]
    FrameAlreadyOpen,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Key service result type
pub type KeyResult<T> = Result<T, KeyError>;

impl KeyError {
    /// Create a malformed-path error
    pub fn malformed_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedPath { path: path.into(), message: message.into() }
    }

    /// Create a keystore-load error
    pub fn keystore_load(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::KeystoreLoad { name: name.into(), message: message.into() }
    }
}

impl ErrorClassification for KeyError {
    /// Key resolution failures are deterministic; retrying without a
    /// configuration or keystore change cannot succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound(_) => ErrorSeverity::Info,
            Self::MalformedPath { .. } => ErrorSeverity::Error,
            Self::Unsupported(_) => ErrorSeverity::Error,
            Self::KeystoreLoad { .. } => ErrorSeverity::Critical,
            Self::InvalidMaterial(_) => ErrorSeverity::Critical,
            Self::FrameRequired => ErrorSeverity::Error,
            Self::FrameAlreadyOpen => ErrorSeverity::Error,
            Self::Config(e) => e.severity(),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error.
    use super::*;

    /// Validates `KeyError` display behavior for the error display scenario.
    ///
    /// Assertions:
    /// - Confirms the not-found message names the path.
    /// - Confirms the keystore message names the keystore.
    #[test]
    fn test_error_display() {
        let err = KeyError::NotFound("apps/signing@2".to_string());
        assert_eq!(err.to_string(), "key not found for path 'apps/signing@2'");

        let err = KeyError::keystore_load("main", "bad password");
        assert_eq!(err.to_string(), "keystore 'main' could not be loaded: bad password");
    }

    /// Validates `KeyError` classification for the severity scenario.
    ///
    /// Assertions:
    /// - Confirms `NotFound` is informational and keystore failures are
    ///   critical.
    #[test]
    fn test_error_severity() {
        assert_eq!(KeyError::NotFound("p".into()).severity(), ErrorSeverity::Info);
        assert_eq!(KeyError::keystore_load("m", "x").severity(), ErrorSeverity::Critical);
        assert_eq!(KeyError::FrameRequired.severity(), ErrorSeverity::Error);
        assert!(!KeyError::FrameAlreadyOpen.is_retryable());
    }
}
