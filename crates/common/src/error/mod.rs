//! Common error classification for the Vaultline crates
//!
//! Every domain error in the workspace implements [`ErrorClassification`]
//! so callers get a uniform answer to the questions that matter when an
//! operation fails: can it be retried, how serious is it, and does it
//! require immediate attention.
//!
//! Module-specific errors are `thiserror` enums that implement the trait
//! themselves; there is deliberately no catch-all error type. A keystore
//! that cannot be unsealed and a salt that is too short are different
//! failures with different severities, and flattening them loses exactly
//! the information monitoring needs.

use std::fmt;
use std::time::Duration;

/// Severity level for error monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, expected conditions (missing optional resources)
    Info,
    /// Degraded but operational (lock contention, transient failures)
    Warning,
    /// Failure requiring attention (invalid input, config errors)
    Error,
    /// System integrity at risk (crypto failures, invariant violations)
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Standard interface for classifying errors by their characteristics
///
/// Implemented by all Vaultline error types to enable consistent retry
/// logic and unified alerting across modules.
pub trait ErrorClassification {
    /// Check if the failed operation can be retried
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    /// Get the suggested retry delay if applicable
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error.
    use super::*;

    /// Validates `ErrorSeverity` ordering for the severity ordering scenario.
    ///
    /// Assertions:
    /// - Ensures `ErrorSeverity::Info < ErrorSeverity::Warning` evaluates to
    ///   true.
    /// - Ensures `ErrorSeverity::Error < ErrorSeverity::Critical` evaluates to
    ///   true.
    #[test]
    fn test_severity_ordering() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
    }

    /// Validates `ErrorSeverity` display behavior for the severity display
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms `ErrorSeverity::Critical.to_string()` equals `"CRITICAL"`.
    #[test]
    fn test_severity_display() {
        assert_eq!(ErrorSeverity::Info.to_string(), "INFO");
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARNING");
        assert_eq!(ErrorSeverity::Error.to_string(), "ERROR");
        assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
    }

    struct AlwaysCritical;

    impl ErrorClassification for AlwaysCritical {
        fn is_retryable(&self) -> bool {
            false
        }

        fn severity(&self) -> ErrorSeverity {
            ErrorSeverity::Critical
        }
    }

    /// Validates `ErrorClassification` default methods for the trait defaults
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures `AlwaysCritical.is_critical()` evaluates to true.
    /// - Confirms `AlwaysCritical.retry_after()` equals `None`.
    #[test]
    fn test_trait_defaults() {
        assert!(AlwaysCritical.is_critical());
        assert_eq!(AlwaysCritical.retry_after(), None);
    }
}
