//! Custom error types for the application.
//!
//! Two error enums with distinct roles:
//!
//! - [`DeviceError`] is the device-layer boundary type. Drivers never let a
//!   transport fault escape as an unhandled error; every failure is mapped
//!   to a variant here, and every variant maps to a wire response code with
//!   the underlying message carried as detail text.
//! - [`ServerError`] covers the binary path: configuration loading, socket
//!   setup, and hardware that was compiled out by feature flags.

use crate::protocol::codes::Code;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feature '{0}' is not enabled. Rebuild with --features {0}")]
    FeatureNotEnabled(String),
}

/// Failures reported by the device capability layer.
///
/// Variants follow the wire protocol's 3X/4X bands; [`DeviceError::code`]
/// performs the mapping so the dispatcher never inspects driver internals.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("unexpected serial port error: {0}")]
    Port(String),

    #[error("unable to connect to serial port: {0}")]
    PortUnavailable(String),

    #[error("timed out waiting for device: {0}")]
    Timeout(String),

    #[error("laser rejected command: {0}")]
    LaserFault(String),

    #[error("modulation controller returned unexpected response: {0}")]
    AuxRejected(String),

    #[error("auxiliary bus device unreachable: {0}")]
    BusUnavailable(String),
}

impl DeviceError {
    /// The wire response code for this failure.
    pub fn code(&self) -> Code {
        match self {
            DeviceError::Port(_) => Code::PortError,
            DeviceError::PortUnavailable(_) => Code::PortUnavailable,
            DeviceError::Timeout(_) => Code::DeviceTimeout,
            DeviceError::LaserFault(_) => Code::LaserFault,
            DeviceError::AuxRejected(_) => Code::AuxRejected,
            DeviceError::BusUnavailable(_) => Code::BusUnavailable,
        }
    }

    /// The detail text attached to the coded response.
    pub fn detail(&self) -> String {
        match self {
            DeviceError::Port(text)
            | DeviceError::PortUnavailable(text)
            | DeviceError::Timeout(text)
            | DeviceError::LaserFault(text)
            | DeviceError::AuxRejected(text)
            | DeviceError::BusUnavailable(text) => text.clone(),
        }
    }
}
