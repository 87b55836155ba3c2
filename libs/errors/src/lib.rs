//! Unified error handling for ColdWatch services
//!
//! Services keep their own domain error enums and convert into
//! [`ColdwatchError`] at the process boundary. The [`ColdwatchErrorTrait`]
//! gives every error a stable code and a category.

use thiserror::Error;

// ============================================================================
// ColdwatchError - Main error type
// ============================================================================

/// Main error type for all ColdWatch services
#[derive(Debug, Error)]
pub enum ColdwatchError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ======================================
    // Ingestion Errors
    // ======================================
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    // ======================================
    // Communication Errors
    // ======================================
    #[error("Communication error: {0}")]
    Communication(String),

    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    #[error("External service error: {service}: {message}")]
    ExternalService { service: String, message: String },

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ======================================
    // Service & Runtime Errors
    // ======================================
    #[error("Service startup failed: {0}")]
    StartupFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using ColdwatchError
pub type ColdwatchResult<T> = Result<T, ColdwatchError>;

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::ColdwatchError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::ColdwatchError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! startup_error {
    ($msg:expr) => {
        $crate::ColdwatchError::StartupFailed($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::ColdwatchError::StartupFailed(format!($fmt, $($arg)*))
    };
}

// ============================================================================
// ColdwatchError implements ColdwatchErrorTrait
// ============================================================================

impl ColdwatchErrorTrait for ColdwatchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::Communication(_) => "COMMUNICATION_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::StartupFailed(_) => "STARTUP_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::MalformedPayload(_) => ErrorCategory::Validation,
            Self::Communication(_) | Self::ExternalService { .. } => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Io(_) | Self::StartupFailed(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

// ============================================================================
// ColdWatch Error Trait - Architectural layer
// ============================================================================

/// Error category enum - used for classification and log routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    // Infrastructure layer
    Configuration,
    Network,
    Timeout,
    Connection,

    // Ingestion layer
    Validation,

    // System level
    Internal,
}

/// ColdWatch error capability trait
///
/// Each service keeps its own domain-specific error type (e.g. `AlarmSrvError`)
/// and gains a common interface by implementing this trait.
pub trait ColdwatchErrorTrait: std::error::Error + Send + Sync + 'static {
    /// Get error code (for logs and monitoring)
    fn error_code(&self) -> &'static str;

    /// Get error category
    fn category(&self) -> ErrorCategory;

    /// Whether the error is transient (category-based)
    fn is_transient(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::Connection
        )
    }
}
