//! Programming phases.
//!
//! Each phase owns only its own counters. Everything shared across phases
//! (port, receiver, clock, image, expected version) is lent in through
//! [`Context`] for the duration of a single step.

use crate::error::{Error, Result};
use crate::flasher::Stage;
use crate::flasher::clock::Clock;
use crate::flasher::identity::{BootloaderVersion, DeviceInfo, HANDSHAKE_VERSION_LEN};
use crate::image::{FirmwareImage, PAGE_SIZE};
use crate::port::Port;
use crate::protocol::message::{HEADER_LEN, Message, MessageType};
use crate::protocol::packet;
use crate::protocol::receiver::MessageReceiver;
use log::{debug, info, trace, warn};

/// Shortest accepted gap between beacons (1/100 s).
pub const MIN_BEACON_INTERVAL: u64 = 5;

/// Longest accepted gap between beacons (1/100 s).
pub const MAX_BEACON_INTERVAL: u64 = 100;

/// Consecutive in-cadence beacons needed to accept a device.
pub const REQUIRED_BEACONS: u32 = 5;

/// Version replies needed to finish the handshake.
pub const REQUIRED_EXCHANGES: u32 = 3;

/// Payload length of a page program request.
pub const PAGE_REQUEST_PAYLOAD_LEN: usize = 12 + PAGE_SIZE;

/// Payload length of a page program response.
pub const PAGE_RESPONSE_PAYLOAD_LEN: usize = 8;

// Absolute offsets inside page request/response messages.
const TOKEN_OFFSET: usize = HEADER_LEN;
const PAGE_INDEX_OFFSET: usize = 8;
const PAGE_COUNT_OFFSET: usize = 10;
const RESPONSE_ERROR_OFFSET: usize = 10;
const PAGE_DATA_OFFSET: usize = 16;

/// Resources borrowed by a phase for one step.
pub(crate) struct Context<'a, P: ?Sized, C: ?Sized> {
    pub port: &'a mut P,
    pub receiver: &'a mut MessageReceiver,
    pub clock: &'a C,
    pub image: &'a FirmwareImage,
    pub expected: &'a BootloaderVersion,
}

impl<P: Port + ?Sized, C: Clock + ?Sized> Context<'_, P, C> {
    fn recv(&mut self) -> Result<Option<Message>> {
        self.receiver
            .poll(&mut *self.port)
    }

    fn send(&mut self, msg: &Message) -> Result<()> {
        trace!("Sending {msg:?}");
        self.port
            .write(&packet::encode(msg))?;
        self.port.flush()
    }
}

/// Current phase of a programming session.
#[derive(Debug)]
pub(crate) enum Phase {
    Discovery(Discovery),
    Handshake(Handshake),
    Transfer(Transfer),
    Completed,
}

impl Phase {
    pub(crate) fn start() -> Self {
        Self::Discovery(Discovery::default())
    }

    /// Advance by at most one message. Returns the next phase on a
    /// transition, `None` to stay.
    pub(crate) fn step<P: Port + ?Sized, C: Clock + ?Sized>(
        &mut self,
        ctx: &mut Context<'_, P, C>,
    ) -> Result<Option<Self>> {
        match self {
            Self::Discovery(discovery) => discovery.step(ctx),
            Self::Handshake(handshake) => handshake.step(ctx),
            Self::Transfer(transfer) => transfer.step(ctx),
            Self::Completed => Ok(None),
        }
    }

    pub(crate) fn stage(&self) -> Stage {
        match self {
            Self::Discovery(_) => Stage::Discovery,
            Self::Handshake(_) => Stage::Handshake,
            Self::Transfer(transfer) => Stage::Transfer {
                page: transfer.page_index,
                page_count: transfer.page_count,
            },
            Self::Completed => Stage::Completed,
        }
    }
}

/// Waits for a steady stream of Device-Info beacons.
#[derive(Debug, Default)]
pub(crate) struct Discovery {
    last_seen: u64,
    consecutive: u32,
}

impl Discovery {
    fn step<P: Port + ?Sized, C: Clock + ?Sized>(
        &mut self,
        ctx: &mut Context<'_, P, C>,
    ) -> Result<Option<Phase>> {
        let Some(msg) = ctx.recv()? else {
            return Ok(None);
        };

        if !msg.is(MessageType::DeviceInfo) {
            trace!("Unexpected {msg:?} during discovery");
            self.consecutive = 0;
            return Ok(None);
        }

        let now = ctx.clock.now();
        let delta = now.saturating_sub(self.last_seen);
        self.last_seen = now;

        if !(MIN_BEACON_INTERVAL..=MAX_BEACON_INTERVAL).contains(&delta) {
            debug!("Beacon out of cadence ({delta}/100 s since last)");
            self.consecutive = 0;
            return Ok(None);
        }

        let Some(info) = DeviceInfo::from_message(&msg) else {
            debug!("Beacon too short: {} payload bytes", msg.payload().len());
            self.consecutive = 0;
            return Ok(None);
        };

        if self.consecutive == 0 {
            info!("Establishing contact with device...");
            info!("UID: {}", info.uid_hex());
            info!("Bootloader version: {}", info.bootloader_version);
        }

        self.consecutive += 1;
        if self.consecutive < REQUIRED_BEACONS {
            return Ok(None);
        }

        info!("Device detected");
        if !ctx
            .expected
            .matches(&info.bootloader_version)
        {
            warn!(
                "Bootloader version mismatch: expected {}, device reports {}",
                ctx.expected, info.bootloader_version
            );
        }

        Ok(Some(Phase::Handshake(Handshake::default())))
    }
}

/// Answers beacons with the expected bootloader version.
#[derive(Debug, Default)]
pub(crate) struct Handshake {
    exchanges: u32,
}

impl Handshake {
    fn step<P: Port + ?Sized, C: Clock + ?Sized>(
        &mut self,
        ctx: &mut Context<'_, P, C>,
    ) -> Result<Option<Phase>> {
        let Some(msg) = ctx.recv()? else {
            return Ok(None);
        };

        if !msg.is(MessageType::DeviceInfo) {
            trace!("Unexpected {msg:?} during handshake");
            self.exchanges = 0;
            return Ok(None);
        }

        if self.exchanges == 0 {
            info!("Handshaking...");
        }

        let mut reply = Message::new(MessageType::BootloaderVersion, HANDSHAKE_VERSION_LEN);
        reply.set_bytes_at(HEADER_LEN, &ctx.expected.handshake_bytes());
        ctx.send(&reply)?;

        self.exchanges += 1;
        if self.exchanges < REQUIRED_EXCHANGES {
            return Ok(None);
        }

        info!("Handshake done");
        Ok(Some(Phase::Transfer(Transfer::start(ctx.image, ctx.clock))))
    }
}

/// Sends the image page by page, one request in flight at a time.
#[derive(Debug)]
pub(crate) struct Transfer {
    page_index: u16,
    page_count: u16,
    session_token: u32,
    awaiting_response: bool,
}

impl Transfer {
    #[allow(clippy::cast_possible_truncation)]
    fn start<C: Clock + ?Sized>(image: &FirmwareImage, clock: &C) -> Self {
        Self {
            page_index: 0,
            page_count: image.page_count(),
            // Low 32 bits of the clock
            session_token: clock.now() as u32,
            awaiting_response: false,
        }
    }

    fn page_request(&self, image: &FirmwareImage) -> Message {
        let mut msg = Message::new(MessageType::ProgramFirmware, PAGE_REQUEST_PAYLOAD_LEN);
        msg.set_u32_at(TOKEN_OFFSET, self.session_token);
        msg.set_u16_at(PAGE_INDEX_OFFSET, self.page_index);
        msg.set_u16_at(PAGE_COUNT_OFFSET, self.page_count);
        msg.set_bytes_at(PAGE_DATA_OFFSET, &image.page(self.page_index));
        msg
    }

    fn step<P: Port + ?Sized, C: Clock + ?Sized>(
        &mut self,
        ctx: &mut Context<'_, P, C>,
    ) -> Result<Option<Phase>> {
        if !self.awaiting_response {
            info!(
                "Programming page {} / {}...",
                u32::from(self.page_index) + 1,
                self.page_count
            );
            let request = self.page_request(ctx.image);
            ctx.send(&request)?;
            self.awaiting_response = true;
            return Ok(None);
        }

        let Some(msg) = ctx.recv()? else {
            return Ok(None);
        };

        if !msg.is(MessageType::ProgramFirmwareResponse) {
            trace!("Ignoring {msg:?} while waiting for page response");
            return Ok(None);
        }

        if msg.payload_len() != PAGE_RESPONSE_PAYLOAD_LEN
            || msg.payload().len() < PAGE_RESPONSE_PAYLOAD_LEN
        {
            return Err(Error::Protocol(format!(
                "page response declares {} payload bytes and carries {}, expected {PAGE_RESPONSE_PAYLOAD_LEN}",
                msg.payload_len(),
                msg.payload().len()
            )));
        }

        let token = msg.u32_at(TOKEN_OFFSET);
        let page = msg.u16_at(PAGE_INDEX_OFFSET);
        let err = msg.u16_at(RESPONSE_ERROR_OFFSET);

        if token != self.session_token || page != self.page_index {
            debug!(
                "Response for token {token:#010x} page {page}, expected {:#010x} page {}",
                self.session_token, self.page_index
            );
        }

        self.awaiting_response = false;

        if err != 0 {
            warn!("Programming failed: err = {err}, page = {page}; retrying");
            return Ok(None);
        }

        self.page_index += 1;
        if self.page_index < self.page_count {
            return Ok(None);
        }

        info!("Firmware programming done");
        Ok(Some(Phase::Completed))
    }
}
