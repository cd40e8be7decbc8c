//! Error types for bleinq-core.
//!
//! Most BLE operations in this crate report an [`Outcome`](crate::Outcome)
//! rather than an error, so that a failed phase can be recorded and the
//! next phase (for example the cleanup disconnect) can still run. [`Error`]
//! covers everything around that: adapter discovery, peripheral lookup,
//! configuration, and converting an outcome for callers that prefer `?`.
//!
//! ## Mapping outcomes to errors
//!
//! | Outcome | Error |
//! |---------|-------|
//! | `TimedOut` | [`Error::TimedOut`] |
//! | `Busy` | [`Error::Busy`] |
//! | `NotConnected` | [`Error::NotConnected`] |
//! | `NotDiscovered` | [`Error::NotDiscovered`] |
//! | `Failed(msg)` | [`Error::OperationFailed`] |

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to BLE peripherals.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No Bluetooth adapter is available on this host.
    #[error("No Bluetooth adapter available")]
    NoAdapter,

    /// Peripheral not found during lookup.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// A request was made while another one was in flight.
    #[error("Another operation is in progress")]
    Busy,

    /// Operation attempted while not connected.
    #[error("Not connected to device")]
    NotConnected,

    /// Operation attempted before services were discovered.
    #[error("Services not discovered")]
    NotDiscovered,

    /// The completion signal did not arrive in time.
    #[error("Operation timed out")]
    TimedOut,

    /// An operation with a known name and budget timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The transport or the peripheral reported a failure.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// Failed to parse data received from the peripheral.
    #[error("Invalid data: {0}")]
    InvalidData(#[from] bleinq_types::ParseError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(identifier.into())
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using bleinq-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
