//! Scan command implementation.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, bail};
use bleinq_core::{BleContext, DeviceRegistry, STOPPED_BY_USER, ScanOptions};
use bleinq_types::Timeout;
use tracing::info;

use crate::cli::OutputFormat;
use crate::format::{format_scan_json, format_scan_text};
use crate::util::write_output;

pub async fn cmd_scan(
    timeout: Timeout,
    all: bool,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    registry: DeviceRegistry,
) -> Result<()> {
    let context = BleContext::new()
        .await
        .context("Failed to access the Bluetooth adapter")?;
    let session = context.scan_session();

    let stopper = session.stopper();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stopper.stop_by_user();
        }
    });

    if !quiet && matches!(format, OutputFormat::Text) {
        eprintln!("Scanning for {} (Ctrl-C to stop)...", timeout);
    }

    let registry = Arc::new(Mutex::new(registry));
    let sink = Arc::clone(&registry);
    let options = ScanOptions::new().timeout(timeout).sensors_only(!all);
    let error = session
        .scan_with_options(options, move |adv| {
            if let Ok(mut registry) = sink.lock() {
                registry.observe(&adv);
            }
        })
        .await;
    ctrl_c.abort();

    let registry = registry
        .lock()
        .map_err(|_| anyhow!("Device registry is poisoned"))?;
    let content = match format {
        OutputFormat::Json => format_scan_json(registry.devices())?,
        OutputFormat::Text => format_scan_text(registry.devices(), !quiet),
    };
    write_output(output, &content)?;

    match error {
        Some(error) if error == STOPPED_BY_USER => {
            info!("Scan stopped by user");
            Ok(())
        }
        Some(error) => bail!("Scan failed: {}", error),
        None => Ok(()),
    }
}
