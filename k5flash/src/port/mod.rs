//! Port abstraction for serial communication.
//!
//! The protocol layer only needs three operations from a transport: a read
//! that never waits, a write, and a flush. Keeping the trait that small lets
//! the codec and the state machine run against an in-memory port in tests.
//!
//! ```text
//! +-------------------+
//! |  Flasher (phases) |
//! +---------+---------+
//!           |
//! +---------+---------+
//! |  MessageReceiver  |
//! +---------+---------+
//!           |
//! +---------+---------+
//! |    Port trait     |
//! +---------+---------+
//!           |
//! +---------+---------+
//! | NativePort        |
//! | (serialport)      |
//! +-------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::time::Duration;

use crate::error::Result;

/// Baud rate of the bootloader UART.
pub const DEFAULT_BAUD: u32 = 38400;

/// Read timeout used to make serial reads effectively non-blocking.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_micros(100);

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Byte transport used by the protocol layer.
pub trait Port {
    /// Read whatever is available right now into `buf`.
    ///
    /// Returns immediately. `Ok(0)` means no data is pending; it is not an
    /// end-of-stream condition.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Block until everything written has been handed to the device.
    fn flush(&mut self) -> Result<()>;
}

impl<P: Port + ?Sized> Port for &mut P {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_nonblocking(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<P: Port + ?Sized> Port for Box<P> {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_nonblocking(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
