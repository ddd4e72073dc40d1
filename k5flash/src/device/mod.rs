//! Serial port discovery for programming cables.
//!
//! UV-K5 programming cables are plain USB-to-UART bridges wired to the
//! radio's Kenwood-style jack. The bridge chip is the only thing
//! identifiable over USB, so ports are ranked by bridge kind.

use crate::error::{Error, Result};

#[cfg(feature = "native")]
use log::{debug, info, trace};

/// USB-to-UART bridge chips found in programming cables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CableKind {
    /// CH340/CH341.
    Ch340,
    /// Silicon Labs CP210x.
    Cp210x,
    /// Prolific PL2303.
    Prolific,
    /// FTDI FT232 family.
    Ftdi,
    /// Anything else.
    Unknown,
}

const KNOWN_BRIDGES: &[(u16, &[u16], CableKind)] = &[
    (0x1A86, &[0x7523, 0x7522, 0x5523, 0x55D4], CableKind::Ch340),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71], CableKind::Cp210x),
    (0x067B, &[0x2303, 0x23A3, 0x23C3, 0x23D3], CableKind::Prolific),
    (0x0403, &[0x6001, 0x6010, 0x6014, 0x6015], CableKind::Ftdi),
];

impl CableKind {
    /// Classify a USB VID/PID pair.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        KNOWN_BRIDGES
            .iter()
            .find(|(known_vid, pids, _)| *known_vid == vid && pids.contains(&pid))
            .map_or(Self::Unknown, |(_, _, kind)| *kind)
    }

    /// Human-readable bridge name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Ch340 => "CH340/CH341",
            Self::Cp210x => "CP210x",
            Self::Prolific => "PL2303",
            Self::Ftdi => "FTDI",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether the bridge was recognised.
    pub fn is_known(self) -> bool {
        self != Self::Unknown
    }

    /// Bridges shipped in most K5 cables, tried first.
    pub fn is_preferred(self) -> bool {
        matches!(self, Self::Ch340 | Self::Cp210x | Self::Prolific)
    }
}

/// A serial port with whatever USB metadata the OS reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedPort {
    /// Port name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub name: String,
    /// Classified bridge.
    pub cable: CableKind,
    /// USB vendor ID.
    pub vid: Option<u16>,
    /// USB product ID.
    pub pid: Option<u16>,
    /// USB manufacturer string.
    pub manufacturer: Option<String>,
    /// USB product string.
    pub product: Option<String>,
    /// USB serial number.
    pub serial: Option<String>,
}

impl DetectedPort {
    /// A port without USB metadata.
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cable: CableKind::Unknown,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial: None,
        }
    }
}

/// Enumerate serial ports.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<DetectedPort> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
            return Vec::new();
        },
    };

    ports
        .into_iter()
        .map(|info| {
            let mut port = DetectedPort::plain(info.port_name);

            if let serialport::SerialPortType::UsbPort(usb) = info.port_type {
                port.cable = CableKind::from_vid_pid(usb.vid, usb.pid);
                port.vid = Some(usb.vid);
                port.pid = Some(usb.pid);
                port.manufacturer = usb.manufacturer;
                port.product = usb.product;
                port.serial = usb.serial_number;

                trace!(
                    "Found USB port: {} (VID: {:04X}, PID: {:04X}, {:?})",
                    port.name, usb.vid, usb.pid, port.cable
                );
            }

            port
        })
        .collect()
}

/// Enumerate serial ports (unavailable without the `native` feature).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<DetectedPort> {
    Vec::new()
}

/// Pick the most likely programming cable: a preferred bridge, then any
/// known bridge, then the first port.
pub fn select_port(ports: &[DetectedPort]) -> Option<&DetectedPort> {
    ports
        .iter()
        .find(|p| p.cable.is_preferred())
        .or_else(|| ports.iter().find(|p| p.cable.is_known()))
        .or_else(|| ports.first())
}

/// Detect and pick a single port.
#[cfg(feature = "native")]
pub fn auto_detect_port() -> Result<DetectedPort> {
    let ports = detect_ports();
    let port = select_port(&ports).ok_or(Error::DeviceNotFound)?;

    if port.cable.is_known() {
        info!("Auto-detected {} cable: {}", port.cable.name(), port.name);
    } else {
        info!("Using first available port: {}", port.name);
    }

    Ok(port.clone())
}

/// Detect and pick a single port (unavailable without the `native` feature).
#[cfg(not(feature = "native"))]
pub fn auto_detect_port() -> Result<DetectedPort> {
    Err(Error::DeviceNotFound)
}

/// One display line per port.
pub fn format_port_list(ports: &[DetectedPort]) -> Vec<String> {
    ports
        .iter()
        .map(|port| {
            let cable = if port.cable.is_known() {
                format!(" [{}]", port.cable.name())
            } else if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
                format!(" [VID:{vid:04X} PID:{pid:04X}]")
            } else {
                String::new()
            };

            let product = port
                .product
                .as_ref()
                .map(|p| format!(" - {p}"))
                .unwrap_or_default();

            format!("{}{cable}{product}", port.name)
        })
        .collect()
}
