//! Flash command implementation.

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use k5flash::{BootloaderVersion, FirmwareImage, Flasher, NativePort, SerialConfig, Stage};
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::serial::{resolve_baud, select_serial_port};
use crate::{Cli, CliError, install_interrupt_handler, use_fancy_output};

/// Bootloader version announced when none is configured.
pub(crate) const DEFAULT_BL_VER: &str = "?";

/// Longest bootloader version accepted from the user.
pub(crate) const MAX_BL_VER_LEN: usize = 4;

/// Resolve the expected bootloader version: flag or environment, then
/// config, then [`DEFAULT_BL_VER`].
pub(crate) fn resolve_bl_ver(flag: Option<&str>, config: &Config) -> Result<BootloaderVersion> {
    let (value, from_config) = match (flag, config.flash.bl_ver.as_deref()) {
        (Some(value), _) => (value, false),
        (None, Some(value)) => (value, true),
        (None, None) => (DEFAULT_BL_VER, false),
    };

    let reject = |message: String| -> anyhow::Error {
        if from_config {
            CliError::Config(message).into()
        } else {
            CliError::Usage(message).into()
        }
    };

    if value.chars().count() > MAX_BL_VER_LEN {
        return Err(reject(format!(
            "bootloader version '{value}' is longer than {MAX_BL_VER_LEN} characters"
        )));
    }

    BootloaderVersion::new(value).map_err(|e| reject(e.to_string()))
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet || !use_fancy_output() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn show_stage(pb: &ProgressBar, stage: Stage) {
    match stage {
        Stage::Discovery => pb.set_message("Waiting for radio..."),
        Stage::Handshake => pb.set_message("Handshaking..."),
        Stage::Transfer { page, page_count } => {
            let total = u64::from(page_count);
            if pb.length() != Some(total) {
                pb.set_length(total);
                #[allow(clippy::unwrap_used)] // Static template string
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template(
                            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages {msg}",
                        )
                        .unwrap()
                        .progress_chars("#>-"),
                );
                pb.set_message("");
            }
            pb.set_position(u64::from(page));
        },
        Stage::Completed => pb.finish_with_message("complete"),
    }
}

/// Flash command implementation.
pub(crate) fn cmd_flash(
    cli: &Cli,
    config: &Config,
    firmware: &Path,
    bl_ver: Option<&str>,
) -> Result<()> {
    let expected = resolve_bl_ver(bl_ver, config)?;

    if !cli.quiet {
        eprintln!(
            "{} Loading firmware: {}",
            style("📦").cyan(),
            firmware.display()
        );
    }

    let image = FirmwareImage::from_file(firmware)
        .with_context(|| format!("Failed to load firmware: {}", firmware.display()))?;

    if !cli.quiet {
        eprintln!(
            "{} {} bytes in {} pages",
            style("ℹ").blue(),
            image.len(),
            image.page_count()
        );
    }

    let port_name = select_serial_port(cli.port.as_deref(), config)?;
    let baud = resolve_baud(cli.baud, config);
    if !cli.quiet {
        eprintln!(
            "{} Using port {} at {} baud",
            style("🔌").cyan(),
            port_name,
            baud
        );
    }

    let mut port = NativePort::open(&SerialConfig::new(&port_name, baud))
        .with_context(|| format!("Failed to open serial port {port_name}"))?;
    port.clear_buffers()?;

    install_interrupt_handler();

    if !cli.quiet {
        eprintln!(
            "{} Turn the radio on while holding PTT to enter flash mode",
            style("⏳").yellow()
        );
    }

    let pb = progress_bar(cli.quiet);
    let mut flasher = Flasher::new(port, image, expected);
    let result = flasher.run(|stage| show_stage(&pb, stage));

    // Release the serial port before reporting
    flasher.into_port().close();

    match result {
        Ok(()) => {},
        Err(k5flash::Error::Interrupted) => {
            pb.abandon();
            return Err(CliError::Cancelled("flashing interrupted".to_string()).into());
        },
        Err(err) => {
            pb.abandon();
            return Err(err).context("Flashing failed");
        },
    }

    if !cli.quiet {
        eprintln!(
            "\n{} Firmware programmed successfully",
            style("🎉").green().bold()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(err: &anyhow::Error) -> &CliError {
        err.downcast_ref::<CliError>()
            .expect("classified error")
    }

    #[test]
    fn test_bl_ver_default() {
        let version = resolve_bl_ver(None, &Config::default()).unwrap();
        assert_eq!(version.as_str(), "?");
        assert!(!version.is_wildcard());
    }

    #[test]
    fn test_bl_ver_flag_over_config() {
        let mut config = Config::default();
        config.flash.bl_ver = Some("5.00".to_string());

        assert_eq!(resolve_bl_ver(Some("*"), &config).unwrap().as_str(), "*");
        assert_eq!(resolve_bl_ver(None, &config).unwrap().as_str(), "5.00");
    }

    #[test]
    fn test_bl_ver_too_long_flag_is_usage_error() {
        let err = resolve_bl_ver(Some("7.00.07"), &Config::default()).unwrap_err();
        assert!(matches!(classify(&err), CliError::Usage(_)));
    }

    #[test]
    fn test_bl_ver_too_long_config_is_config_error() {
        let mut config = Config::default();
        config.flash.bl_ver = Some("7.00.07".to_string());

        let err = resolve_bl_ver(None, &config).unwrap_err();
        assert!(matches!(classify(&err), CliError::Config(_)));
    }

    #[test]
    fn test_bl_ver_non_ascii_rejected() {
        let err = resolve_bl_ver(Some("é"), &Config::default()).unwrap_err();
        assert!(matches!(classify(&err), CliError::Usage(_)));
    }

    #[test]
    fn test_show_stage_on_hidden_bar() {
        let pb = ProgressBar::hidden();
        show_stage(&pb, Stage::Discovery);
        show_stage(
            &pb,
            Stage::Transfer {
                page: 3,
                page_count: 10,
            },
        );
        assert_eq!(pb.length(), Some(10));
        assert_eq!(pb.position(), 3);

        show_stage(&pb, Stage::Completed);
        assert!(pb.is_finished());
    }
}
