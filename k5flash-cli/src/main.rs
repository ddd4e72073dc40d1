//! k5flash CLI - Command-line tool for flashing Quansheng UV-K5 V2 radios.
//!
//! ## Features
//!
//! - Flash raw firmware images through the radio bootloader
//! - Inspect firmware images
//! - List serial ports and detect programming cables
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;
mod serial;

use commands::flash::cmd_flash;
use commands::info::cmd_info;
use commands::list_ports::cmd_list_ports;
use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Set by the Ctrl-C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if emoji/animations should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Whether the user pressed Ctrl-C.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Route Ctrl-C into the library's interrupt checker. A second Ctrl-C
/// exits immediately.
pub(crate) fn install_interrupt_handler() {
    if let Err(e) = ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::Relaxed) {
            std::process::exit(EXIT_CANCELLED);
        }
    }) {
        debug!("Failed to install Ctrl-C handler: {e}");
    }

    k5flash::set_interrupt_checker(was_interrupted);
}

/// Exit code for unexpected/runtime errors.
const EXIT_FAILURE: i32 = 1;
/// Exit code for usage errors.
const EXIT_USAGE: i32 = 2;
/// Exit code for configuration errors.
const EXIT_CONFIG: i32 = 3;
/// Exit code when no device or port was found.
const EXIT_DEVICE_NOT_FOUND: i32 = 4;
/// Exit code after Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

/// Classified CLI failures with dedicated exit codes.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad arguments or port selection.
    #[error("{0}")]
    Usage(String),
    /// Bad configuration value.
    #[error("{0}")]
    Config(String),
    /// No port or device found.
    #[error("{0}")]
    DeviceNotFound(String),
    /// Cancelled by the user.
    #[error("{0}")]
    Cancelled(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => EXIT_USAGE,
            Self::Config(_) => EXIT_CONFIG,
            Self::DeviceNotFound(_) => EXIT_DEVICE_NOT_FOUND,
            Self::Cancelled(_) => EXIT_CANCELLED,
        }
    }
}

fn library_exit_code(err: &k5flash::Error) -> Option<i32> {
    match err {
        k5flash::Error::DeviceNotFound => Some(EXIT_DEVICE_NOT_FOUND),
        k5flash::Error::Interrupted => Some(EXIT_CANCELLED),
        k5flash::Error::Serial(e) if matches!(e.kind, serialport::ErrorKind::NoDevice) => {
            Some(EXIT_DEVICE_NOT_FOUND)
        },
        _ => None,
    }
}

/// Map an error chain to a process exit code.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return cli_err.exit_code();
        }
        if let Some(code) = cause
            .downcast_ref::<k5flash::Error>()
            .and_then(library_exit_code)
        {
            return code;
        }
    }
    EXIT_FAILURE
}

/// k5flash - Flash firmware onto Quansheng UV-K5 V2 radios.
///
/// Environment variables:
///   K5FLASH_PORT    - Default serial port
///   K5FLASH_BAUD    - Default baud rate (default: 38400)
///   K5FLASH_BL_VER  - Bootloader version announced during the handshake
#[derive(Parser)]
#[command(name = "k5flash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(
    after_help = "Power the radio on while holding PTT to enter flash mode, then run `k5flash flash`."
)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "K5FLASH_PORT")]
    port: Option<String>,

    /// Baud rate [default: 38400].
    #[arg(short, long, global = true, env = "K5FLASH_BAUD")]
    baud: Option<u32>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Flash a raw firmware image.
    Flash {
        /// Path to the firmware binary.
        firmware: PathBuf,

        /// Bootloader version to announce, at most 4 characters; `*` accepts any device.
        #[arg(long, env = "K5FLASH_BL_VER", value_name = "VER")]
        bl_ver: Option<String>,
    },

    /// Show information about a firmware file.
    Info {
        /// Path to the firmware binary.
        firmware: PathBuf,

        /// Output information as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let log_level = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(verbose >= 2)
        .format_timestamp(if verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn run() -> Result<()> {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var_os("NO_COLOR").is_some() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    debug!(
        "k5flash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Flash { firmware, bl_ver } => {
            cmd_flash(&cli, &config, firmware, bl_ver.as_deref())?;
        },
        Commands::Info { firmware, json } => {
            cmd_info(firmware, *json)?;
        },
        Commands::ListPorts { json } => {
            cmd_list_ports(*json);
        },
    }

    Ok(())
}

fn main() {
    let code = match run() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            exit_code_for(&err)
        },
    };

    std::process::exit(code);
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use anyhow::Context;
    use clap::CommandFactory;

    // ---- clap validation ----

    #[test]
    fn test_cli_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_flash() {
        let cli = Cli::try_parse_from([
            "k5flash",
            "--port",
            "/dev/ttyUSB0",
            "--baud",
            "38400",
            "flash",
            "firmware.bin",
            "--bl-ver",
            "7.00",
        ])
        .unwrap();

        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(cli.baud, Some(38400));
        if let Commands::Flash { firmware, bl_ver } = cli.command {
            assert_eq!(firmware.to_str().unwrap(), "firmware.bin");
            assert_eq!(bl_ver.as_deref(), Some("7.00"));
        } else {
            panic!("Expected Flash command");
        }
    }

    #[test]
    fn test_cli_parse_info_json() {
        let cli = Cli::try_parse_from(["k5flash", "info", "--json", "firmware.bin"]).unwrap();
        assert!(matches!(cli.command, Commands::Info { json: true, .. }));
    }

    #[test]
    fn test_cli_parse_list_ports() {
        let cli = Cli::try_parse_from(["k5flash", "list-ports"]).unwrap();
        assert!(matches!(cli.command, Commands::ListPorts { json: false }));
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "k5flash",
            "-p",
            "COM3",
            "-b",
            "9600",
            "-vv",
            "--quiet",
            "--config",
            "/tmp/k5flash.toml",
            "list-ports",
        ])
        .unwrap();

        assert_eq!(cli.port.as_deref(), Some("COM3"));
        assert_eq!(cli.baud, Some(9600));
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
        assert_eq!(
            cli.config_path.as_deref(),
            Some(std::path::Path::new("/tmp/k5flash.toml"))
        );
    }

    #[test]
    fn test_cli_missing_subcommand() {
        assert!(Cli::try_parse_from(["k5flash"]).is_err());
    }

    #[test]
    fn test_cli_flash_requires_firmware() {
        assert!(Cli::try_parse_from(["k5flash", "flash"]).is_err());
    }

    #[test]
    fn test_cli_invalid_baud() {
        assert!(Cli::try_parse_from(["k5flash", "-b", "fast", "list-ports"]).is_err());
    }

    // ---- exit codes ----

    #[test]
    fn test_exit_codes_for_cli_errors() {
        let cases = [
            (CliError::Usage(String::new()), 2),
            (CliError::Config(String::new()), 3),
            (CliError::DeviceNotFound(String::new()), 4),
            (CliError::Cancelled(String::new()), 130),
        ];
        for (err, code) in cases {
            assert_eq!(exit_code_for(&err.into()), code);
        }
    }

    #[test]
    fn test_exit_codes_for_library_errors() {
        let not_found: anyhow::Error = k5flash::Error::DeviceNotFound.into();
        assert_eq!(exit_code_for(&not_found), 4);

        let interrupted: anyhow::Error = k5flash::Error::Interrupted.into();
        assert_eq!(exit_code_for(&interrupted), 130);

        let protocol: anyhow::Error = k5flash::Error::Protocol("bad".into()).into();
        assert_eq!(exit_code_for(&protocol), 1);

        let no_device: anyhow::Error = k5flash::Error::Serial(serialport::Error::new(
            serialport::ErrorKind::NoDevice,
            "missing",
        ))
        .into();
        assert_eq!(exit_code_for(&no_device), 4);
    }

    #[test]
    fn test_exit_code_looks_through_context() {
        let err = Err::<(), _>(k5flash::Error::DeviceNotFound)
            .context("Failed to open serial port")
            .unwrap_err();
        assert_eq!(exit_code_for(&err), 4);

        let plain = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&plain), 1);
    }
}
