//! Output formatting for scan results and decoded readings.

use anyhow::Result;
use bleinq_core::DeviceRecord;
use bleinq_types::XiaomiSensorReading;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

const MISSING: &str = "-";

/// Serialize value to a pretty JSON string ending in a newline.
pub fn as_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)? + "\n")
}

fn or_missing<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| MISSING.to_string(), |v| v.to_string())
}

// ============================================================================
// Scan formatting
// ============================================================================

pub fn format_scan_json(devices: &[DeviceRecord]) -> Result<String> {
    #[derive(Serialize)]
    struct ScanResult<'a> {
        count: usize,
        devices: &'a [DeviceRecord],
    }

    as_json(&ScanResult {
        count: devices.len(),
        devices,
    })
}

#[must_use]
pub fn format_scan_text(devices: &[DeviceRecord], show_tips: bool) -> String {
    if devices.is_empty() {
        let mut out = "No devices found.\n".to_string();
        if show_tips {
            out.push_str("\nMake sure:\n");
            out.push_str("  - Bluetooth is enabled on this computer\n");
            out.push_str("  - The sensor is within range\n");
            out.push_str("  - Use --all to list every advertiser\n");
        }
        return out;
    }

    let mut builder = Builder::default();
    builder.push_record([
        "Name",
        "Address",
        "Temperature",
        "Humidity",
        "Battery",
        "Status",
    ]);
    for device in devices {
        builder.push_record([
            device.display_name().to_string(),
            device.address.clone(),
            or_missing(device.temperature.map(|t| format!("{:.1} °C", t))),
            or_missing(device.humidity.map(|h| format!("{:.1} %", h))),
            or_missing(device.battery.map(|b| format!("{} %", b))),
            device.error.clone().unwrap_or_else(|| "OK".to_string()),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());

    format!("Found {} device(s)\n\n{}\n", devices.len(), table)
}

// ============================================================================
// Reading formatting
// ============================================================================

#[must_use]
pub fn format_reading_text(reading: &XiaomiSensorReading) -> String {
    let header = &reading.header;
    let mut out = String::new();
    out.push_str(&format!("Product:  0x{:04x}\n", header.product_id));
    out.push_str(&format!("Version:  {}\n", header.version));
    out.push_str(&format!("Counter:  {}\n", header.frame_counter));
    out.push_str(&format!(
        "MAC:      {}\n",
        reading.mac_address.as_deref().unwrap_or(MISSING)
    ));
    if let Some(event) = reading.event {
        out.push_str(&format!("Event:    0x{:04x}\n", event.id()));
    }
    if header.flags.is_encrypted() {
        out.push_str("Payload:  encrypted (not interpreted)\n");
    }

    let values = reading.to_string();
    if values.is_empty() {
        out.push_str("Values:   none\n");
    } else {
        out.push_str(&format!("Values:   {}\n", values));
    }
    out
}

pub fn format_reading_json(reading: &XiaomiSensorReading) -> Result<String> {
    as_json(reading)
}

#[cfg(test)]
mod tests {
    use bleinq_types::decode_sensor_advertisement;

    use super::*;

    const TEMP_HUMIDITY: [u8; 18] = [
        0x50, 0x20, 0xaa, 0x01, 0xb4, 0xf6, 0x16, 0x33, 0x34, 0x2d, 0x58, 0x0d, 0x10, 0x04, 0xe8,
        0x00, 0x5f, 0x02,
    ];

    #[test]
    fn test_format_reading_text() {
        let reading = decode_sensor_advertisement(&TEMP_HUMIDITY).unwrap();
        let text = format_reading_text(&reading);
        assert!(text.contains("Product:  0x01aa"));
        assert!(text.contains("MAC:      58:2d:34:33:16:f6"));
        assert!(text.contains("Values:   temperature is 23.2°C, humidity is 60.7%"));
    }

    #[test]
    fn test_format_reading_json() {
        let reading = decode_sensor_advertisement(&TEMP_HUMIDITY).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&format_reading_json(&reading).unwrap()).unwrap();
        assert_eq!(json["mac_address"], "58:2d:34:33:16:f6");
        assert_eq!(json["humidity"], 60.7);
    }

    #[test]
    fn test_format_scan_text_empty() {
        assert_eq!(format_scan_text(&[], false), "No devices found.\n");
        assert!(format_scan_text(&[], true).contains("--all"));
    }

    #[test]
    fn test_format_scan_text_table() {
        let mut record = DeviceRecord::new("58:2D:34:33:16:F6");
        record.set_custom_name("Greenhouse");
        record.battery = Some(90);
        let text = format_scan_text(&[record], false);
        assert!(text.starts_with("Found 1 device(s)"));
        assert!(text.contains("Greenhouse"));
        assert!(text.contains("90 %"));
        assert!(text.contains("OK"));
    }

    #[test]
    fn test_format_scan_json() {
        let record = DeviceRecord::new("58:2D:34:33:16:F6");
        let json: serde_json::Value =
            serde_json::from_str(&format_scan_json(&[record]).unwrap()).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["devices"][0]["address"], "58:2D:34:33:16:F6");
    }
}
