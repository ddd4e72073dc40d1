//! Bootloader messages.
//!
//! A message is a 4-byte header followed by its payload:
//!
//! ```text
//! +----------+-------------+-----------------+
//! |   Type   | Payload len |     Payload     |
//! +----------+-------------+-----------------+
//! | u16 (LE) |  u16 (LE)   |   len bytes     |
//! +----------+-------------+-----------------+
//! ```
//!
//! Field accessors take offsets from the start of the header, so offset 4 is
//! the first payload byte. This matches how the bootloader documents its
//! message layouts.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Size of the message header (type + payload length).
pub const HEADER_LEN: usize = 4;

/// Message type codes understood by the UV-K5 V2 bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    /// Program the 0xF80 region (0x0516). Not driven by this crate.
    ProgramF80 = 0x0516,

    /// Response to [`MessageType::ProgramF80`] (0x0517).
    ProgramF80Response = 0x0517,

    /// Periodic device information beacon sent by the bootloader (0x0518).
    DeviceInfo = 0x0518,

    /// Program one firmware page (0x0519).
    ProgramFirmware = 0x0519,

    /// Result of programming one firmware page (0x051A).
    ProgramFirmwareResponse = 0x051A,

    /// Host bootloader version notification, used for the handshake (0x0530).
    BootloaderVersion = 0x0530,
}

impl MessageType {
    /// Get the wire code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Look up a known message type by wire code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0516 => Some(Self::ProgramF80),
            0x0517 => Some(Self::ProgramF80Response),
            0x0518 => Some(Self::DeviceInfo),
            0x0519 => Some(Self::ProgramFirmware),
            0x051A => Some(Self::ProgramFirmwareResponse),
            0x0530 => Some(Self::BootloaderVersion),
            _ => None,
        }
    }
}

impl From<MessageType> for u16 {
    fn from(ty: MessageType) -> Self {
        ty.code()
    }
}

/// A bootloader message: header plus payload in one contiguous buffer.
#[derive(Clone)]
pub struct Message {
    buf: Vec<u8>,
}

impl Message {
    /// Create a message with a zero-filled payload of `payload_len` bytes.
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(msg_type: impl Into<u16>, payload_len: usize) -> Self {
        debug_assert!(payload_len <= usize::from(u16::MAX));

        let mut msg = Self {
            buf: vec![0u8; HEADER_LEN + payload_len],
        };
        msg.set_u16_at(0, msg_type.into());
        msg.set_u16_at(2, payload_len as u16);
        msg
    }

    /// Wrap raw message bytes (header followed by payload).
    ///
    /// The payload length is taken from the header; it is not checked
    /// against the buffer size.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        debug_assert!(buf.len() >= HEADER_LEN);
        Self { buf }
    }

    /// Raw message type code.
    pub fn msg_type(&self) -> u16 {
        self.u16_at(0)
    }

    /// Known message type, if the code is in the protocol table.
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::from_code(self.msg_type())
    }

    /// Check whether this message has the given type.
    pub fn is(&self, ty: MessageType) -> bool {
        self.msg_type() == ty.code()
    }

    /// Payload length declared in the header.
    pub fn payload_len(&self) -> usize {
        usize::from(self.u16_at(2))
    }

    /// Payload bytes, as declared by the header.
    pub fn payload(&self) -> &[u8] {
        let end = (HEADER_LEN + self.payload_len()).min(self.buf.len());
        &self.buf[HEADER_LEN..end]
    }

    /// Full message bytes (header and payload, plus any trailing pad).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Read a little-endian u16 at `offset` from the start of the header.
    pub fn u16_at(&self, offset: usize) -> u16 {
        LittleEndian::read_u16(&self.buf[offset..offset + 2])
    }

    /// Read a little-endian u32 at `offset` from the start of the header.
    pub fn u32_at(&self, offset: usize) -> u32 {
        LittleEndian::read_u32(&self.buf[offset..offset + 4])
    }

    /// Write a little-endian u16 at `offset` from the start of the header.
    pub fn set_u16_at(&mut self, offset: usize, value: u16) {
        LittleEndian::write_u16(&mut self.buf[offset..offset + 2], value);
    }

    /// Write a little-endian u32 at `offset` from the start of the header.
    pub fn set_u32_at(&mut self, offset: usize, value: u32) {
        LittleEndian::write_u32(&mut self.buf[offset..offset + 4], value);
    }

    /// Copy `data` into the message at `offset` from the start of the header.
    pub fn set_bytes_at(&mut self, offset: usize, data: &[u8]) {
        self.buf[offset..offset + data.len()].copy_from_slice(data);
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.msg_type() == other.msg_type() && self.payload() == other.payload()
    }
}

impl Eq for Message {}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Message");
        match self.kind() {
            Some(kind) => dbg.field("type", &kind),
            None => dbg.field("type", &format!("{:#06X}", self.msg_type())),
        };
        dbg.field("payload", &self.payload()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sets_header() {
        let msg = Message::new(MessageType::BootloaderVersion, 4);

        assert_eq!(msg.as_bytes(), &[0x30, 0x05, 0x04, 0x00, 0, 0, 0, 0]);
        assert_eq!(msg.kind(), Some(MessageType::BootloaderVersion));
        assert_eq!(msg.payload_len(), 4);
        assert_eq!(msg.payload(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_field_accessors_are_header_relative() {
        let mut msg = Message::new(0x1234u16, 8);
        msg.set_u32_at(4, 0xDEADBEEF);
        msg.set_u16_at(8, 0x0102);
        msg.set_u16_at(10, 0x0304);

        assert_eq!(msg.payload(), &[0xEF, 0xBE, 0xAD, 0xDE, 0x02, 0x01, 0x04, 0x03]);
        assert_eq!(msg.u32_at(4), 0xDEADBEEF);
        assert_eq!(msg.u16_at(8), 0x0102);
        assert_eq!(msg.u16_at(10), 0x0304);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_offset_panics() {
        let msg = Message::new(MessageType::DeviceInfo, 2);
        let _ = msg.u32_at(4);
    }

    #[test]
    fn test_from_bytes_uses_declared_length() {
        // Declared payload of 1 byte followed by a pad byte
        let msg = Message::from_bytes(vec![0x18, 0x05, 0x01, 0x00, 0x7F, 0x00]);

        assert!(msg.is(MessageType::DeviceInfo));
        assert_eq!(msg.payload_len(), 1);
        assert_eq!(msg.payload(), &[0x7F]);
    }

    #[test]
    fn test_equality_ignores_pad() {
        let mut a = Message::new(MessageType::DeviceInfo, 1);
        a.set_bytes_at(4, &[0x7F]);
        let b = Message::from_bytes(vec![0x18, 0x05, 0x01, 0x00, 0x7F, 0x00]);

        assert_eq!(a, b);
    }

    #[test]
    fn test_message_type_codes() {
        for ty in [
            MessageType::ProgramF80,
            MessageType::ProgramF80Response,
            MessageType::DeviceInfo,
            MessageType::ProgramFirmware,
            MessageType::ProgramFirmwareResponse,
            MessageType::BootloaderVersion,
        ] {
            assert_eq!(MessageType::from_code(ty.code()), Some(ty));
        }
        assert_eq!(MessageType::from_code(0x4C4C), None);
    }
}
