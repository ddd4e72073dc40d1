//! Info command implementation.

use anyhow::{Context, Result};
use console::style;
use k5flash::FirmwareImage;
use k5flash::image::{MAX_IMAGE_SIZE, PAGE_SIZE};
use std::path::Path;

/// Bytes used in the final page.
fn last_page_fill(image: &FirmwareImage) -> usize {
    match image.len() % PAGE_SIZE {
        0 => PAGE_SIZE,
        n => n,
    }
}

fn load(firmware: &Path) -> Result<FirmwareImage> {
    FirmwareImage::from_file(firmware)
        .with_context(|| format!("Failed to load firmware: {}", firmware.display()))
}

/// Info command implementation.
pub(crate) fn cmd_info(firmware: &Path, json: bool) -> Result<()> {
    if json {
        return cmd_info_json(firmware);
    }

    eprintln!(
        "{} Loading firmware: {}",
        style("📦").cyan(),
        firmware.display()
    );

    let image = load(firmware)?;

    eprintln!("\n{}", style("Firmware Information").bold().underlined());
    eprintln!("  Size:       {} bytes", image.len());
    eprintln!("  Pages:      {} x {PAGE_SIZE} bytes", image.page_count());
    eprintln!(
        "  Last page:  {} of {PAGE_SIZE} bytes used",
        last_page_fill(&image)
    );
    eprintln!("  Limit:      {MAX_IMAGE_SIZE} bytes");

    Ok(())
}

/// Info command --json output: structured JSON to stdout.
fn cmd_info_json(firmware: &Path) -> Result<()> {
    let image = load(firmware)?;

    let info = serde_json::json!({
        "path": firmware.display().to_string(),
        "size": image.len(),
        "page_size": PAGE_SIZE,
        "page_count": image.page_count(),
        "last_page_fill": last_page_fill(&image),
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&info).unwrap_or_default()
    );
    Ok(())
}
