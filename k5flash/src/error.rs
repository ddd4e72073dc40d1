//! Error types for k5flash.

use std::io;
use thiserror::Error;

/// Result type for k5flash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for k5flash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Firmware image cannot be programmed.
    #[error("Invalid firmware image: {0}")]
    InvalidImage(String),

    /// Bootloader version string cannot be sent to the device.
    #[error("Invalid bootloader version: {0}")]
    InvalidVersion(String),

    /// The device broke the wire contract.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No serial port found.
    #[error("Device not found")]
    DeviceNotFound,

    /// The embedding application asked the session to stop.
    #[error("Interrupted")]
    Interrupted,
}
