//! Decode command implementation.
//!
//! Decodes a Xiaomi sensor advertisement without touching the radio.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bleinq_types::decode_sensor_advertisement;
use bleinq_types::value::parse_hex;

use crate::cli::OutputFormat;
use crate::format::{format_reading_json, format_reading_text};
use crate::util::write_output;

pub fn cmd_decode(payload: &str, format: OutputFormat, output: Option<&PathBuf>) -> Result<()> {
    let bytes = parse_hex(payload).context("Invalid hex payload")?;
    let reading = decode_sensor_advertisement(&bytes).context("Failed to decode payload")?;

    let content = match format {
        OutputFormat::Json => format_reading_json(&reading)?,
        OutputFormat::Text => format_reading_text(&reading),
    };
    write_output(output, &content)
}
