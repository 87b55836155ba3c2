//! Error handling for the Alarm Service

use errors::{ColdwatchError, ColdwatchErrorTrait, ErrorCategory};
use thiserror::Error;

use crate::parser::ParseError;

/// Alarm Service error type
#[derive(Error, Debug)]
pub enum AlarmSrvError {
    /// Configuration-related errors (missing channel settings, bad method, ...)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Input/Output operation errors
    #[error("IO error: {0}")]
    IoError(String),

    /// Payload could not be decoded
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),

    /// Broker or gateway connection errors
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A single channel delivery failed (bus publish or one SMS)
    #[error("Delivery error: {channel}: {message}")]
    DeliveryError { channel: String, message: String },

    /// Operation timeout errors
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Internal errors (closed queues, stopped tasks)
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for the Alarm Service
pub type Result<T> = std::result::Result<T, AlarmSrvError>;

impl AlarmSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        AlarmSrvError::ConfigError(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        AlarmSrvError::ConnectionError(msg.into())
    }

    pub fn delivery(channel: impl Into<String>, msg: impl Into<String>) -> Self {
        AlarmSrvError::DeliveryError {
            channel: channel.into(),
            message: msg.into(),
        }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        AlarmSrvError::TimeoutError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AlarmSrvError::InternalError(msg.into())
    }
}

// ============================================================================
// From implementations for external error types
// ============================================================================

impl From<std::io::Error> for AlarmSrvError {
    fn from(err: std::io::Error) -> Self {
        AlarmSrvError::IoError(err.to_string())
    }
}

impl From<figment::Error> for AlarmSrvError {
    fn from(err: figment::Error) -> Self {
        AlarmSrvError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for AlarmSrvError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AlarmSrvError::TimeoutError(format!("SMS gateway: {err}"))
        } else if err.is_connect() {
            AlarmSrvError::ConnectionError(format!("SMS gateway: {err}"))
        } else {
            AlarmSrvError::delivery("sms", err.to_string())
        }
    }
}

impl From<rumqttc::ClientError> for AlarmSrvError {
    fn from(err: rumqttc::ClientError) -> Self {
        AlarmSrvError::delivery("mqtt", err.to_string())
    }
}

impl From<rumqttc::ConnectionError> for AlarmSrvError {
    fn from(err: rumqttc::ConnectionError) -> Self {
        AlarmSrvError::ConnectionError(format!("MQTT broker: {err}"))
    }
}

// ============================================================================
// Conversion from AlarmSrvError to ColdwatchError at the process boundary
// ============================================================================

impl From<AlarmSrvError> for ColdwatchError {
    fn from(err: AlarmSrvError) -> Self {
        match err {
            AlarmSrvError::ConfigError(msg) => ColdwatchError::Configuration(msg),
            AlarmSrvError::IoError(msg) => ColdwatchError::Io(std::io::Error::other(msg)),
            AlarmSrvError::ParseError(e) => ColdwatchError::MalformedPayload(e.to_string()),
            AlarmSrvError::ConnectionError(msg) => ColdwatchError::Communication(msg),
            AlarmSrvError::DeliveryError { channel, message } => ColdwatchError::ExternalService {
                service: channel,
                message,
            },
            AlarmSrvError::TimeoutError(msg) => ColdwatchError::Timeout(msg),
            AlarmSrvError::InternalError(msg) => ColdwatchError::Internal(msg),
        }
    }
}

impl ColdwatchErrorTrait for AlarmSrvError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "ALARMSRV_CONFIG_ERROR",
            Self::IoError(_) => "ALARMSRV_IO_ERROR",
            Self::ParseError(_) => "ALARMSRV_PARSE_ERROR",
            Self::ConnectionError(_) => "ALARMSRV_CONNECTION_ERROR",
            Self::DeliveryError { .. } => "ALARMSRV_DELIVERY_ERROR",
            Self::TimeoutError(_) => "ALARMSRV_TIMEOUT",
            Self::InternalError(_) => "ALARMSRV_INTERNAL_ERROR",
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError(_) => ErrorCategory::Configuration,
            Self::IoError(_) => ErrorCategory::Internal,
            Self::ParseError(_) => ErrorCategory::Validation,
            Self::ConnectionError(_) => ErrorCategory::Connection,
            Self::DeliveryError { .. } => ErrorCategory::Network,
            Self::TimeoutError(_) => ErrorCategory::Timeout,
            Self::InternalError(_) => ErrorCategory::Internal,
        }
    }
}
