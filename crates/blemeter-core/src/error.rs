//! Error types for blemeter-core.
//!
//! This module defines the errors that can occur while talking to meters
//! over Bluetooth Low Energy and while setting up a logging session.
//!
//! # Transient vs Fatal
//!
//! The per-device connection machine splits failures in two classes with
//! [`Error::is_transient`]:
//!
//! | Error Type | Class | Handling |
//! |------------|-------|----------|
//! | [`Error::Bluetooth`] | Transient | Back off 2 s, reconnect |
//! | [`Error::Timeout`] | Transient | Back off 2 s, reconnect |
//! | [`Error::LinkLost`] | Transient | Back off 2 s, reconnect |
//! | [`Error::NotConnected`] | Transient | Back off 2 s, reconnect |
//! | [`Error::DeviceNotFound`] | Transient | Back off 2 s, reconnect |
//! | [`Error::WriteFailed`] | Transient | Back off 2 s, reconnect |
//! | [`Error::CharacteristicNotFound`] | Fatal | Abandon device, stop session |
//! | [`Error::Unexpected`] | Fatal | Abandon device, stop session |
//! | [`Error::InvalidConfig`] | Fatal | Refuse to start |
//! | [`Error::UnknownModel`] | Fatal | Refuse to start |
//!
//! Transient failures are retried forever until the session is cancelled.
//! A fatal failure ends that device's task and cancels the whole session.
//!
//! Frame decoding never produces an [`Error`]: a frame that does not fit
//! its model becomes an absent reading (see [`blemeter_types::ParseError`]).

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when communicating with meters.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Device not found during scan or connection.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Operation attempted while not connected to device.
    #[error("Not connected to device")]
    NotConnected,

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The device stopped sending notifications.
    #[error("Lost connection to device (silent for {silence:?})")]
    LinkLost {
        /// How long the device had been silent when the loss was declared.
        silence: Duration,
    },

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Write operation failed.
    #[error("Write failed to characteristic {uuid}: {reason}")]
    WriteFailed {
        /// The characteristic UUID.
        uuid: String,
        /// The reason for the failure.
        reason: String,
    },

    /// A transport failure that retrying cannot fix.
    #[error("Unexpected transport failure: {0}")]
    Unexpected(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The named meter model is not supported.
    #[error("Unknown meter model: {0}")]
    UnknownModel(String),
}

/// Reason why a device was not found.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// Device with specified address not found.
    NotFound { identifier: String },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether the connection machine should back off and reconnect.
    ///
    /// Everything else abandons the device and stops the session.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Bluetooth(_)
                | Error::DeviceNotFound(_)
                | Error::NotConnected
                | Error::Timeout { .. }
                | Error::LinkLost { .. }
                | Error::WriteFailed { .. }
        )
    }
}

/// Result type alias using blemeter-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
