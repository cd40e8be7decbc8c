//! Utility functions for CLI operations.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use bleinq_core::{
    BleContext, CharacteristicReader, DEFAULT_BATTERY_READ_TIMEOUT, GattTransport, OpenedPeripheral,
};
use bleinq_types::Timeout;
use bleinq_types::uuid::standard_uuid;
use uuid::Uuid;

use crate::cli::DeviceArgs;
use crate::config::{Config, print_alias_feedback, resolve_device, resolve_timeout};

/// How long to look for a device before giving up.
pub const DEFAULT_LOOKUP_TIMEOUT: Timeout = Timeout::secs(15);

/// A device to talk to and the budgets for doing so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    pub device: String,
    /// Budget for the whole connect/discover/read/disconnect sequence.
    pub timeout: Timeout,
    pub scan_timeout: Timeout,
}

impl DeviceTarget {
    /// Resolve flags against the config: flags win, then config, then defaults.
    pub fn resolve(args: DeviceArgs, config: &Config, quiet: bool) -> Result<Self> {
        let original = args.device.clone().or_else(|| config.device.clone());
        let device = require_device(resolve_device(args.device, config))?;
        if let Some(original) = original {
            print_alias_feedback(&original, &device, quiet);
        }
        Ok(Self {
            device,
            timeout: resolve_timeout(args.timeout, config.read_timeout, DEFAULT_BATTERY_READ_TIMEOUT),
            scan_timeout: resolve_timeout(
                args.scan_timeout,
                config.scan_timeout,
                DEFAULT_LOOKUP_TIMEOUT,
            ),
        })
    }
}

/// Get device identifier, with helpful error message.
pub fn require_device(device: Option<String>) -> Result<String> {
    device.ok_or_else(|| {
        anyhow!(
            "No device specified. Use --device <ADDRESS> or set BLEINQ_DEVICE environment variable.\n\
             Run 'bleinq scan' to find nearby devices."
        )
    })
}

/// Parse a UUID given in full or as a 16-bit short form such as `180f`.
pub fn parse_uuid(input: &str) -> Result<Uuid> {
    let trimmed = input.trim();
    let short = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if short.len() == 4
        && let Ok(value) = u16::from_str_radix(short, 16)
    {
        return Ok(standard_uuid(value));
    }
    Uuid::parse_str(trimmed).with_context(|| format!("Invalid UUID: {}", input))
}

/// Find a device and set up a reader for it.
pub async fn open_reader(
    identifier: &str,
    scan_timeout: Timeout,
) -> Result<CharacteristicReader<GattTransport>> {
    let context = BleContext::new()
        .await
        .context("Failed to access the Bluetooth adapter")?;
    let OpenedPeripheral {
        transport, handler, ..
    } = context
        .open(identifier, scan_timeout)
        .await
        .with_context(|| format!("Failed to find device {}", identifier))?;
    Ok(CharacteristicReader::new(Arc::new(transport), handler))
}

/// Fail with `status` unless it reports success.
pub fn ensure_success(status: &str, what: &str) -> Result<()> {
    if status != "Success" {
        bail!("{} failed: {}", what, status);
    }
    Ok(())
}

/// Write output to file or stdout
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}
