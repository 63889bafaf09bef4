//! Error types for telesim-core

use thiserror::Error;

/// Device configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    #[error("Empty device name")]
    EmptyName,

    #[error("Device {device}: empty telemetry key")]
    EmptyTelemetryKey { device: String },

    #[error("Device {device}: invalid range [{min}, {max}]")]
    InvalidRange { device: String, min: f64, max: f64 },

    #[error("Device {device}: initial value {value} outside [{min}, {max}]")]
    InitialValueOutOfRange {
        device: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Device {device}: binary initial value must be 0 or 1, got {value}")]
    InvalidBinaryValue { device: String, value: f64 },

    #[error("Device {device}: invalid publish interval [{low}s, {high}s]")]
    InvalidInterval { device: String, low: f64, high: f64 },

    #[error("Device {device}: empty extra metric key")]
    EmptyMetricKey { device: String },

    #[error("Device {device}: metric key {key} used more than once")]
    DuplicateMetricKey { device: String, key: String },

    #[error("Device {device}: metric {key} has invalid range [{low}, {high}]")]
    InvalidMetricRange {
        device: String,
        key: String,
        low: f64,
        high: f64,
    },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
