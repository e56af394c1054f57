//! Error classification
//!
//! Adapter errors implement [`ErrorClassification`] so callers can decide how
//! loudly to report a failure and whether another attempt is worthwhile,
//! without matching on every adapter's variants.

use std::fmt;

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again (timeouts, dropped connections, a process that went away).
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    enum FetchError {
        Dropped,
        Broken,
    }

    impl ErrorClassification for FetchError {
        fn is_retryable(&self) -> bool {
            matches!(self, Self::Dropped)
        }

        fn severity(&self) -> ErrorSeverity {
            match self {
                Self::Dropped => ErrorSeverity::Warning,
                Self::Broken => ErrorSeverity::Critical,
            }
        }
    }

    #[test]
    fn critical_follows_severity_by_default() {
        assert!(FetchError::Broken.is_critical());
        assert!(!FetchError::Dropped.is_critical());
        assert!(FetchError::Dropped.is_retryable());
    }

    #[test]
    fn severities_order_and_display() {
        assert!(ErrorSeverity::Critical > ErrorSeverity::Error);
        assert!(ErrorSeverity::Warning > ErrorSeverity::Info);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }
}
