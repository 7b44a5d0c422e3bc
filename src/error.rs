//! Error types and handling for Astrape
//!
//! This module defines the error types used throughout the library,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Astrape operations
pub type Result<T> = std::result::Result<T, AstrapeError>;

/// Main error type for Astrape
#[derive(Debug, Error)]
pub enum AstrapeError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Modbus transport errors (connect/read/write failures)
    #[error("Modbus error: {message}")]
    Modbus { message: String },

    /// Device-reported Modbus exceptions (illegal address/function)
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Register decoding errors (length/encoding mismatches)
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Unrecognized raw charge status reported by the device
    #[error("Invalid status: {raw}")]
    InvalidStatus { raw: String },

    /// Operation not backed by the vendor register map
    #[error("Not supported: {operation}")]
    NotSupported { operation: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl AstrapeError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        AstrapeError::Config {
            message: message.into(),
        }
    }

    /// Create a new Modbus transport error
    pub fn modbus<S: Into<String>>(message: S) -> Self {
        AstrapeError::Modbus {
            message: message.into(),
        }
    }

    /// Create a new protocol exception error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        AstrapeError::Protocol {
            message: message.into(),
        }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(message: S) -> Self {
        AstrapeError::Decode {
            message: message.into(),
        }
    }

    /// Create a new invalid-status error carrying the raw device value
    pub fn invalid_status<S: ToString>(raw: S) -> Self {
        AstrapeError::InvalidStatus {
            raw: raw.to_string(),
        }
    }

    /// Create a new not-supported error for an absent optional capability
    pub fn not_supported<S: Into<String>>(operation: S) -> Self {
        AstrapeError::NotSupported {
            operation: operation.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        AstrapeError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        AstrapeError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        AstrapeError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        AstrapeError::Generic {
            message: message.into(),
        }
    }

    /// Whether the error is a validation failure callers should not retry
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AstrapeError::Validation { .. }
                | AstrapeError::NotSupported { .. }
                | AstrapeError::Decode { .. }
        )
    }
}

impl From<std::io::Error> for AstrapeError {
    fn from(err: std::io::Error) -> Self {
        AstrapeError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for AstrapeError {
    fn from(err: serde_yaml::Error) -> Self {
        AstrapeError::Serialization {
            message: err.to_string(),
        }
    }
}
