//! Battery command implementation.

use std::path::PathBuf;

use anyhow::{Result, bail};
use bleinq_core::PhaseReport;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::format::as_json;
use crate::util::{DeviceTarget, open_reader, write_output};

#[derive(Debug, Serialize)]
struct BatteryResult<'a> {
    device: &'a str,
    battery: Option<u8>,
    status: &'a str,
    phases: Vec<String>,
}

pub async fn cmd_battery(
    target: &DeviceTarget,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
) -> Result<()> {
    let reader = open_reader(&target.device, target.scan_timeout).await?;

    let mut phases = Vec::new();
    let (level, status) = reader
        .read_battery_level(target.timeout, |report: &PhaseReport| {
            if !quiet && matches!(format, OutputFormat::Text) {
                eprintln!("  {}", report);
            }
            phases.push(report.to_string());
        })
        .await;

    let content = match format {
        OutputFormat::Json => as_json(&BatteryResult {
            device: &target.device,
            battery: level,
            status: &status,
            phases,
        })?,
        OutputFormat::Text => match level {
            Some(level) => format!("Battery: {}%\n", level),
            None => String::new(),
        },
    };
    write_output(output, &content)?;

    if level.is_none() {
        bail!("Battery read failed: {}", status);
    }
    Ok(())
}
