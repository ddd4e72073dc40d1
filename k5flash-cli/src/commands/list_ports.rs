//! List ports command implementation.

use console::style;
use k5flash::{DetectedPort, detect_ports, device::select_port};

fn ports_json(ports: &[DetectedPort]) -> serde_json::Value {
    ports
        .iter()
        .map(|p| {
            serde_json::json!({
                "name": p.name,
                "cable": p.cable.name(),
                "known": p.cable.is_known(),
                "vid": p.vid,
                "pid": p.pid,
                "manufacturer": p.manufacturer,
                "product": p.product,
                "serial": p.serial,
            })
        })
        .collect()
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) {
    let detected = detect_ports();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&ports_json(&detected)).unwrap_or_default()
        );
        return;
    }

    eprintln!("{}", style("Available serial ports").bold().underlined());

    if detected.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return;
    }

    for port in &detected {
        let cable = if port.cable.is_known() {
            format!(" [{}]", style(port.cable.name()).yellow())
        } else {
            String::new()
        };

        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };

        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        eprintln!(
            "  {} {}{cable}{vid_pid}{product}",
            style("•").green(),
            style(&port.name).cyan(),
        );
    }

    if let Some(auto) = select_port(&detected) {
        eprintln!(
            "\n{} Auto-detect would use {}",
            style("→").green().bold(),
            style(&auto.name).cyan().bold()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k5flash::CableKind;

    #[test]
    fn test_ports_json_shape() {
        let port = DetectedPort {
            cable: CableKind::Cp210x,
            vid: Some(0x10C4),
            pid: Some(0xEA60),
            ..DetectedPort::plain("/dev/ttyUSB0")
        };

        let value = ports_json(&[port, DetectedPort::plain("/dev/ttyS0")]);
        let array = value.as_array().unwrap();

        assert_eq!(array.len(), 2);
        assert_eq!(array[0]["cable"], "CP210x");
        assert_eq!(array[0]["known"], true);
        assert_eq!(array[0]["vid"], 0x10C4);
        assert_eq!(array[1]["known"], false);
        assert!(array[1]["vid"].is_null());
    }

    #[test]
    fn test_ports_json_empty_is_array() {
        assert!(ports_json(&[]).as_array().unwrap().is_empty());
    }
}
