//! # k5flash
//!
//! A library for flashing Quansheng UV-K5 V2 radios through their serial
//! bootloader.
//!
//! The bootloader announces itself with a stream of Device-Info beacons once
//! the radio is powered on in flash mode. This crate provides:
//!
//! - the obfuscated, CRC-protected packet codec and stream resynchronisation
//! - a non-blocking programming state machine (discovery, handshake, page
//!   transfer)
//! - raw firmware image paging
//! - serial port discovery for common programming cables
//!
//! ## Features
//!
//! - `native` (default): serial port support via the `serialport` crate
//!
//! ## Example
//!
//! ```rust,no_run
//! use k5flash::{BootloaderVersion, FirmwareImage, Flasher, Stage};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let image = FirmwareImage::from_file("firmware.bin")?;
//!
//!     #[cfg(feature = "native")]
//!     {
//!         let port = k5flash::NativePort::open_simple("/dev/ttyUSB0", 38400)?;
//!         let mut flasher = Flasher::new(port, image, BootloaderVersion::any());
//!
//!         flasher.run(|stage| {
//!             if let Stage::Transfer { page, page_count } = stage {
//!                 println!("{page}/{page_count}");
//!             }
//!         })?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod device;
pub mod error;
pub mod flasher;
pub mod image;
pub mod port;
pub mod protocol;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker polled by [`Flasher::run`].
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications). Only the first
/// registration takes effect.
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

/// Serialises tests that flip the global interrupt flag.
#[cfg(test)]
pub(crate) static INTERRUPT_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn test_set_interrupted(value: bool) {
    use std::sync::atomic::{AtomicBool, Ordering};

    static TEST_INTERRUPT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

    let flag = TEST_INTERRUPT_FLAG
        .get_or_init(|| {
            let shared = Arc::new(AtomicBool::new(false));
            let checker = Arc::clone(&shared);
            set_interrupt_checker(move || checker.load(Ordering::Relaxed));
            shared
        })
        .clone();

    flag.store(value, Ordering::Relaxed);
}

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::native::NativePort;
pub use {
    device::{CableKind, DetectedPort, auto_detect_port, detect_ports, format_port_list},
    error::{Error, Result},
    flasher::{
        Flasher, Stage,
        clock::{Clock, SystemClock},
        identity::{BootloaderVersion, DeviceInfo},
    },
    image::FirmwareImage,
    port::{Port, SerialConfig},
    protocol::{Message, MessageReceiver, MessageType},
};
