//! Device identity reported in Device-Info beacons and the host-side
//! bootloader version used for the handshake.

use crate::error::{Error, Result};
use crate::protocol::message::{Message, MessageType};
use std::fmt;
use std::str::FromStr;

/// Length of the device UID.
pub const UID_LEN: usize = 16;

/// Length of the bootloader version field in a Device-Info beacon.
pub const VERSION_FIELD_LEN: usize = 16;

/// Bytes of the bootloader version sent back during the handshake.
pub const HANDSHAKE_VERSION_LEN: usize = 4;

/// Identity carried by a Device-Info beacon.
///
/// Payload layout: UID at 0..16, NUL-terminated ASCII bootloader version at
/// 16..32.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device unique ID.
    pub uid: [u8; UID_LEN],
    /// Bootloader version string.
    pub bootloader_version: String,
}

impl DeviceInfo {
    /// Minimum payload length of a usable Device-Info beacon.
    pub const MIN_PAYLOAD_LEN: usize = UID_LEN + VERSION_FIELD_LEN;

    /// Parse a Device-Info beacon. Returns `None` for other messages or a
    /// payload too short to carry an identity.
    pub fn from_message(msg: &Message) -> Option<Self> {
        if !msg.is(MessageType::DeviceInfo) {
            return None;
        }

        let payload = msg.payload();
        if payload.len() < Self::MIN_PAYLOAD_LEN {
            return None;
        }

        let mut uid = [0u8; UID_LEN];
        uid.copy_from_slice(&payload[..UID_LEN]);

        let field = &payload[UID_LEN..UID_LEN + VERSION_FIELD_LEN];
        let end = field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(field.len());

        Some(Self {
            uid,
            bootloader_version: String::from_utf8_lossy(&field[..end]).into_owned(),
        })
    }

    /// UID as space-separated hex bytes.
    pub fn uid_hex(&self) -> String {
        self.uid
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Bootloader version expected from the device and announced back to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootloaderVersion(String);

impl BootloaderVersion {
    /// Version that matches every device.
    pub const WILDCARD: &'static str = "*";

    /// Create a version. Must be ASCII and fit the beacon version field.
    pub fn new(version: impl Into<String>) -> Result<Self> {
        let version = version.into();

        if !version.is_ascii() {
            return Err(Error::InvalidVersion(format!("'{version}' is not ASCII")));
        }

        if version.len() > VERSION_FIELD_LEN {
            return Err(Error::InvalidVersion(format!(
                "'{version}' is longer than {VERSION_FIELD_LEN} characters"
            )));
        }

        Ok(Self(version))
    }

    /// A version accepting any device.
    pub fn any() -> Self {
        Self(Self::WILDCARD.to_string())
    }

    /// The version string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the wildcard version.
    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::WILDCARD
    }

    /// Whether a device reporting `reported` is acceptable.
    pub fn matches(&self, reported: &str) -> bool {
        self.is_wildcard() || self.0 == reported
    }

    /// Handshake form: first four characters, zero padded.
    pub fn handshake_bytes(&self) -> [u8; HANDSHAKE_VERSION_LEN] {
        let mut out = [0u8; HANDSHAKE_VERSION_LEN];
        let bytes = self.0.as_bytes();
        let n = bytes.len().min(HANDSHAKE_VERSION_LEN);
        out[..n].copy_from_slice(&bytes[..n]);
        out
    }
}

impl FromStr for BootloaderVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for BootloaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
