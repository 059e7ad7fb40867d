//! Unified error handling for diskidle
//!
//! This crate provides a single error type used across all diskidle
//! components. It uses thiserror for ergonomic error definitions with proper
//! Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using DiskIdleError
pub type Result<T> = std::result::Result<T, DiskIdleError>;

/// Unified error type for all diskidle operations
#[derive(thiserror::Error, Debug)]
pub enum DiskIdleError {
    // ============================================================================
    // Device Access Errors
    // ============================================================================
    #[error("Device does not exist: {0}")]
    DeviceNotFound(String),

    #[error("Access denied opening {0} (administrator privileges required)")]
    AccessDenied(String),

    #[error("Failed to open device {device}: {reason}")]
    DeviceOpen {
        device: String,
        reason: String,
    },

    // ============================================================================
    // Counter Sampling Errors
    // ============================================================================
    #[error("Failed to query I/O counters for {device}: {reason}")]
    SampleQuery {
        device: String,
        reason: String,
    },

    // ============================================================================
    // Power Command Errors
    // ============================================================================
    #[error("Power command {command} failed for {device}: {reason}")]
    PowerCommand {
        device: String,
        command: String,
        reason: String,
    },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl DiskIdleError {
    /// Create a sample-query error for a device
    pub fn sample_query(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SampleQuery {
            device: device.into(),
            reason: reason.into(),
        }
    }

    /// Create a power-command error for a device
    pub fn power_command(
        device: impl Into<String>,
        command: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::PowerCommand {
            device: device.into(),
            command: command.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_constructors_produce_their_variants() {
        let e = DiskIdleError::sample_query(r"\\.\PhysicalDrive0", "counters disabled");
        assert!(matches!(e, DiskIdleError::SampleQuery { .. }));
        assert_eq!(
            e.to_string(),
            r"Failed to query I/O counters for \\.\PhysicalDrive0: counters disabled"
        );

        let e = DiskIdleError::power_command(r"\\.\PhysicalDrive1", "standby immediate", "aborted");
        assert!(matches!(e, DiskIdleError::PowerCommand { .. }));
        assert_eq!(
            e.to_string(),
            r"Power command standby immediate failed for \\.\PhysicalDrive1: aborted"
        );
    }

    #[test]
    fn file_read_preserves_the_io_source() {
        let e = DiskIdleError::FileRead {
            path: PathBuf::from("diskidle.json"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        assert!(std::error::Error::source(&e).is_some());
        assert!(e.to_string().starts_with("Failed to read file diskidle.json"));
    }
}
