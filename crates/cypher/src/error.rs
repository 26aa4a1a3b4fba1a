//! Cypher service error types

use thiserror::Error;
use vaultline_common::config::ConfigError;
use vaultline_common::error::{ErrorClassification, ErrorSeverity};
use vaultline_common::lifecycle::StateError;
use vaultline_keys::KeyError;

/// Cypher service error type
#[derive(Debug, Error)]
pub enum CypherError {
    #[error("unsupported cypher algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("key material unsuitable for algorithm: {0}")]
    InvalidKey(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("signature operation failed: {0}")]
    Signature(String),

    #[error("concealed payload is malformed: {0}")]
    Malformed(String),

    #[error("concealed-string action failed: {0}")]
    Callback(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Cypher service result type
pub type CypherResult<T> = Result<T, CypherError>;

impl CypherError {
    /// Create an invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl ErrorClassification for CypherError {
    /// Cryptographic failures are deterministic for a given key and
    /// payload; retrying cannot succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnsupportedAlgorithm(_) => ErrorSeverity::Error,
            Self::InvalidArgument(_) => ErrorSeverity::Error,
            Self::InvalidKey(_) => ErrorSeverity::Critical,
            Self::Encrypt(_) => ErrorSeverity::Critical,
            Self::Decrypt(_) => ErrorSeverity::Critical,
            Self::Signature(_) => ErrorSeverity::Critical,
            Self::Malformed(_) => ErrorSeverity::Error,
            Self::Callback(_) => ErrorSeverity::Error,
            Self::Key(e) => e.severity(),
            Self::Config(e) => e.severity(),
            Self::State(e) => e.severity(),
        }
    }
}
