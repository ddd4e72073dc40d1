//! Serial port and baud rate selection.
//!
//! Ports come from, in order: `--port` / `K5FLASH_PORT`, the config file,
//! then auto-detection of programming cables. Selection never prompts.

use {
    crate::{CliError, config::Config},
    anyhow::Result,
    k5flash::{DetectedPort, detect_ports, device::select_port, port::DEFAULT_BAUD},
    log::{debug, info},
};

/// Pick the serial port to open.
pub fn select_serial_port(flag: Option<&str>, config: &Config) -> Result<String> {
    select_from(flag, config, detect_ports)
}

fn select_from<F>(flag: Option<&str>, config: &Config, detect: F) -> Result<String>
where
    F: FnOnce() -> Vec<DetectedPort>,
{
    if let Some(name) = flag {
        return Ok(name.to_string());
    }

    if let Some(name) = &config.connection.serial {
        debug!("Using port from config: {name}");
        return Ok(name.clone());
    }

    let ports = detect();
    let Some(port) = select_port(&ports) else {
        return Err(CliError::DeviceNotFound(
            "no serial ports found; connect the programming cable or pass --port".to_string(),
        )
        .into());
    };

    if port.cable.is_known() {
        info!("Auto-selected port: {} [{}]", port.name, port.cable.name());
    } else {
        info!("Using first available port: {}", port.name);
    }

    Ok(port.name.clone())
}

/// Baud rate from the flag or environment, then config, then the bootloader default.
pub fn resolve_baud(flag: Option<u32>, config: &Config) -> u32 {
    flag.or(config.connection.baud)
        .unwrap_or(DEFAULT_BAUD)
}
