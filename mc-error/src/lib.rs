//! Unified error handling for micctl
//!
//! This crate provides a single error type used across all micctl components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using MicError
pub type Result<T> = std::result::Result<T, MicError>;

/// Unified error type for all micctl operations
#[derive(thiserror::Error, Debug)]
pub enum MicError {
    // ============================================================================
    // I/O and File System Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Configuration and Persistence Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Failed to persist settings: {0}")]
    Persistence(String),

    // ============================================================================
    // Settings Validation Errors
    // ============================================================================
    #[error("Unknown setting key: {0:?}")]
    UnknownKey(String),

    #[error("Missing value for setting {key}")]
    MissingArgument {
        key: String,
    },

    #[error("Malformed value for {key}: {value:?}")]
    MalformedInput {
        key: String,
        value: String,
    },

    #[error("Value for {key} out of range: {value} ({reason})")]
    OutOfRange {
        key: String,
        value: String,
        reason: String,
    },

    // ============================================================================
    // Thermal Interlock Errors
    // ============================================================================
    #[error("Streaming blocked: thermal protection latched")]
    ThermalLatched,

    #[error("Thermal latch is not held")]
    NotLatched,

    // ============================================================================
    // Sensor Errors
    // ============================================================================
    #[error("Sensor read failed for {path}: {reason}")]
    SensorRead {
        path: PathBuf,
        reason: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),
}

impl MicError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid config error for a named field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a persistence error from a string
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a malformed-input error for a setting key
    pub fn malformed(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::MalformedInput {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create an out-of-range error for a setting key
    pub fn out_of_range(
        key: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::OutOfRange {
            key: key.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// True for the validation family that `/api/set` absorbs silently
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownKey(_)
                | Self::MissingArgument { .. }
                | Self::MalformedInput { .. }
                | Self::OutOfRange { .. }
        )
    }
}

// Allow converting from String to MicError
impl From<String> for MicError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to MicError
impl From<&str> for MicError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_family() {
        assert!(MicError::malformed("gain", "abc").is_validation());
        assert!(MicError::out_of_range("rate", 7999, "min 8000").is_validation());
        assert!(MicError::UnknownKey("volume".into()).is_validation());
        assert!(!MicError::ThermalLatched.is_validation());
        assert!(!MicError::config("bad").is_validation());
    }

    #[test]
    fn test_display_messages() {
        let e = MicError::out_of_range("rate", 7999, "must be 8000..=96000");
        assert_eq!(e.to_string(), "Value for rate out of range: 7999 (must be 8000..=96000)");
        assert_eq!(
            MicError::ThermalLatched.to_string(),
            "Streaming blocked: thermal protection latched"
        );
    }
}
