//! Programming session driver.
//!
//! A session runs through four stages:
//!
//! 1. **Discovery**: wait for five Device-Info beacons arriving 50 ms to 1 s
//!    apart.
//! 2. **Handshake**: answer three beacons with the expected bootloader
//!    version.
//! 3. **Transfer**: send the image in 256-byte pages, resending a page the
//!    device rejects.
//! 4. **Completed**: every page acknowledged.
//!
//! [`Flasher::tick`] consumes at most one incoming message (or sends one
//! page request) and never blocks, so callers can drive it from their own
//! loop. [`Flasher::run`] is the blocking convenience loop.

pub mod clock;
pub mod identity;
mod state;

use crate::error::{Error, Result};
use crate::image::FirmwareImage;
use crate::port::Port;
use crate::protocol::receiver::MessageReceiver;
use clock::{Clock, SystemClock};
use identity::BootloaderVersion;
use log::debug;
use state::{Context, Phase};
use std::thread;
use std::time::Duration;

pub use state::{
    MAX_BEACON_INTERVAL, MIN_BEACON_INTERVAL, PAGE_REQUEST_PAYLOAD_LEN, PAGE_RESPONSE_PAYLOAD_LEN,
    REQUIRED_BEACONS, REQUIRED_EXCHANGES,
};

/// Pause between ticks in [`Flasher::run`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Observable progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for a steady beacon stream.
    Discovery,
    /// Exchanging bootloader versions.
    Handshake,
    /// Programming pages.
    Transfer {
        /// Pages acknowledged so far.
        page: u16,
        /// Total pages in the image.
        page_count: u16,
    },
    /// All pages acknowledged.
    Completed,
}

/// Drives one programming session over a port.
pub struct Flasher<P: Port, C: Clock = SystemClock> {
    port: P,
    clock: C,
    receiver: MessageReceiver,
    image: FirmwareImage,
    expected: BootloaderVersion,
    phase: Phase,
}

impl<P: Port> Flasher<P> {
    /// Create a session using the system clock.
    pub fn new(port: P, image: FirmwareImage, expected: BootloaderVersion) -> Self {
        Self::with_clock(port, image, expected, SystemClock::new())
    }
}

impl<P: Port, C: Clock> Flasher<P, C> {
    /// Create a session with a custom clock.
    pub fn with_clock(port: P, image: FirmwareImage, expected: BootloaderVersion, clock: C) -> Self {
        debug!(
            "New session: {} bytes, {} pages, expecting bootloader {}",
            image.len(),
            image.page_count(),
            expected
        );

        Self {
            port,
            clock,
            receiver: MessageReceiver::new(),
            image,
            expected,
            phase: Phase::start(),
        }
    }

    /// Advance the session by one step.
    ///
    /// Returns `Ok(true)` while there is work left and `Ok(false)` once the
    /// session is complete. An error leaves the current stage in place.
    pub fn tick(&mut self) -> Result<bool> {
        let mut ctx = Context {
            port: &mut self.port,
            receiver: &mut self.receiver,
            clock: &self.clock,
            image: &self.image,
            expected: &self.expected,
        };

        if let Some(next) = self.phase.step(&mut ctx)? {
            debug!("Stage {:?} -> {:?}", self.phase.stage(), next.stage());
            self.phase = next;
        }

        Ok(!self.is_complete())
    }

    /// Tick until the session completes, reporting each stage change.
    ///
    /// `on_stage` is called once with the initial stage and again whenever
    /// the stage (including the transfer page counter) changes. Returns
    /// [`Error::Interrupted`] when the embedding application requests it.
    pub fn run<F: FnMut(Stage)>(&mut self, mut on_stage: F) -> Result<()> {
        let mut last = self.stage();
        on_stage(last);

        loop {
            if crate::is_interrupted_requested() {
                return Err(Error::Interrupted);
            }

            let more = self.tick()?;

            let stage = self.stage();
            if stage != last {
                on_stage(stage);
                last = stage;
            }

            if !more {
                return Ok(());
            }

            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.phase.stage()
    }

    /// Whether every page has been acknowledged.
    pub fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::Completed)
    }

    /// The image being programmed.
    pub fn image(&self) -> &FirmwareImage {
        &self.image
    }

    /// The underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// The underlying port, mutably.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Release the port.
    pub fn into_port(self) -> P {
        self.port
    }
}
