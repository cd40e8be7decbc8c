//! Read command implementation.

use std::path::PathBuf;

use anyhow::{Result, bail};
use bleinq_core::PhaseReport;
use bleinq_types::uuid::{describe_characteristic, describe_service};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::format::as_json;
use crate::util::{DeviceTarget, ensure_success, open_reader, write_output};

#[derive(Debug, Serialize)]
struct ReadResult<'a> {
    device: &'a str,
    service: Uuid,
    characteristic: Uuid,
    value: Option<String>,
    text: Option<&'a str>,
    status: &'a str,
}

pub async fn cmd_read(
    target: &DeviceTarget,
    service: Uuid,
    characteristic: Uuid,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
) -> Result<()> {
    let reader = open_reader(&target.device, target.scan_timeout).await?;
    if !quiet && matches!(format, OutputFormat::Text) {
        eprintln!(
            "Reading {} of {}",
            describe_characteristic(&characteristic),
            describe_service(&service)
        );
    }

    let report = reader
        .read_characteristic(service, characteristic, target.timeout, |report: &PhaseReport| {
            if !quiet && matches!(format, OutputFormat::Text) {
                eprintln!("  {}", report);
            }
        })
        .await;

    let content = match format {
        OutputFormat::Json => as_json(&ReadResult {
            device: &target.device,
            service,
            characteristic,
            value: report.value.as_ref().map(|v| v.to_hex()),
            text: report.value.as_ref().and_then(|v| v.as_utf8()),
            status: &report.status,
        })?,
        OutputFormat::Text => match &report.value {
            Some(value) => match value.as_utf8() {
                Some(text) => format!("{} ({:?})\n", value.to_hex(), text),
                None => format!("{}\n", value.to_hex()),
            },
            None => String::new(),
        },
    };
    write_output(output, &content)?;

    if report.value.is_none() {
        ensure_success(&report.status, "Read")?;
        bail!("Read failed: no value");
    }
    Ok(())
}
