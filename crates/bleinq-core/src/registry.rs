//! Latest known state of every peripheral seen while scanning.
//!
//! A [`DeviceRegistry`] merges advertisements and battery reads into one
//! [`DeviceRecord`] per peripheral. Sensor fields only ever move from one
//! value to another: a reading that lacks a field keeps the previous value.
//! A user-chosen name sticks until it is replaced by another custom name.

use std::collections::HashMap;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use bleinq_types::{Advertisement, XiaomiSensorReading};

/// Everything known about one peripheral.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    /// Stable identifier, usually the Bluetooth address.
    pub address: String,
    pub name: Option<String>,
    pub battery: Option<u8>,
    /// Status of the last failed battery read or malformed frame.
    pub error: Option<String>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub luminance: Option<u8>,
    pub moisture: Option<u8>,
    pub fertility: Option<u8>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_update: OffsetDateTime,
    /// The name was set by the user and must not be overwritten.
    pub use_custom_name: bool,
}

impl DeviceRecord {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            battery: None,
            error: None,
            temperature: None,
            humidity: None,
            luminance: None,
            moisture: None,
            fertility: None,
            last_update: OffsetDateTime::now_utc(),
            use_custom_name: false,
        }
    }

    /// The name if known, else the address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }

    /// Merge the fields present in `reading`. Returns whether anything
    /// changed.
    pub fn apply_reading(&mut self, reading: &XiaomiSensorReading) -> bool {
        let mut changed = false;
        changed |= merge(&mut self.temperature, reading.temperature);
        changed |= merge(&mut self.humidity, reading.humidity);
        changed |= merge(&mut self.battery, reading.battery);
        changed |= merge(&mut self.luminance, reading.luminance);
        changed |= merge(&mut self.moisture, reading.moisture);
        changed |= merge(&mut self.fertility, reading.fertility);
        if changed {
            self.error = None;
        }
        changed
    }

    /// Set a user-chosen name. Blank names are ignored.
    pub fn set_custom_name(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let changed = self.name.as_deref() != Some(name) || !self.use_custom_name;
        self.name = Some(name.to_string());
        self.use_custom_name = true;
        changed
    }

    fn set_advertised_name(&mut self, name: Option<&str>) -> bool {
        match name.map(str::trim) {
            Some(name) if !self.use_custom_name && !name.is_empty() => {
                if self.name.as_deref() == Some(name) {
                    false
                } else {
                    self.name = Some(name.to_string());
                    true
                }
            }
            _ => false,
        }
    }
}

fn merge<T: PartialEq + Copy>(field: &mut Option<T>, update: Option<T>) -> bool {
    match update {
        Some(value) if *field != Some(value) => {
            *field = Some(value);
            true
        }
        _ => false,
    }
}

/// What [`DeviceRegistry::observe`] did with an advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Added,
    Updated,
    Unchanged,
}

/// Records in first-seen order, plus user-chosen names.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceRecord>,
    custom_names: HashMap<String, String>,
}

fn normalize(address: &str) -> String {
    address.trim().to_uppercase()
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry with user-chosen names keyed by address.
    #[must_use]
    pub fn with_custom_names<I, K, V>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (address, name) in names {
            self.custom_names.insert(normalize(address.as_ref()), name.into());
        }
        self
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn custom_names(&self) -> &HashMap<String, String> {
        &self.custom_names
    }

    pub fn get(&self, address: &str) -> Option<&DeviceRecord> {
        let key = normalize(address);
        self.devices.iter().find(|d| normalize(&d.address) == key)
    }

    fn get_mut(&mut self, address: &str) -> Option<&mut DeviceRecord> {
        let key = normalize(address);
        self.devices.iter_mut().find(|d| normalize(&d.address) == key)
    }

    /// Merge one advertisement into the registry.
    pub fn observe(&mut self, advertisement: &Advertisement) -> Change {
        let (reading, frame_error) = match advertisement.sensor_reading() {
            Some(Ok(reading)) => (Some(reading), None),
            Some(Err(e)) => {
                debug!("Malformed sensor frame from {}: {}", advertisement.identifier, e);
                (None, Some(e.to_string()))
            }
            None => (None, None),
        };
        let custom_name = self
            .custom_names
            .get(&normalize(&advertisement.identifier))
            .cloned();

        let Some(record) = self.get_mut(&advertisement.identifier) else {
            let mut record = DeviceRecord::new(advertisement.identifier.clone());
            match custom_name {
                Some(name) => {
                    record.set_custom_name(&name);
                }
                None => {
                    record.set_advertised_name(advertisement.name.as_deref());
                }
            }
            if let Some(reading) = &reading {
                record.apply_reading(reading);
            }
            record.error = frame_error;
            debug!("Added {}", record.display_name());
            self.devices.push(record);
            return Change::Added;
        };

        let mut changed = match custom_name {
            Some(name) if !record.use_custom_name => record.set_custom_name(&name),
            _ => record.set_advertised_name(advertisement.name.as_deref()),
        };
        if let Some(reading) = &reading {
            changed |= record.apply_reading(reading);
        }
        if frame_error.is_some() && record.error != frame_error {
            record.error = frame_error;
            changed = true;
        }
        record.last_update = OffsetDateTime::now_utc();

        if changed {
            Change::Updated
        } else {
            Change::Unchanged
        }
    }

    /// Give a device a user-chosen name. Blank names are ignored.
    ///
    /// The name is remembered for devices not seen yet.
    pub fn rename(&mut self, address: &str, name: &str) -> bool {
        if name.trim().is_empty() {
            return false;
        }
        self.custom_names
            .insert(normalize(address), name.trim().to_string());
        match self.get_mut(address) {
            Some(record) => record.set_custom_name(name),
            None => false,
        }
    }

    /// Record the result of a battery read.
    pub fn record_battery(&mut self, address: &str, level: Option<u8>, status: &str) -> bool {
        let Some(record) = self.get_mut(address) else {
            return false;
        };
        match level {
            Some(level) => {
                record.battery = Some(level);
                record.error = None;
            }
            None => record.error = Some(status.to_string()),
        }
        record.last_update = OffsetDateTime::now_utc();
        true
    }
}

#[cfg(test)]
mod tests {
    use bleinq_types::uuid::XIAOMI_ROOT_SERVICE;

    use super::*;

    const ADDRESS: &str = "58:2D:34:33:16:F6";
    const TEMP_AND_HUMIDITY: [u8; 18] = [
        0x50, 0x20, 0xaa, 0x01, 0xb4, 0xf6, 0x16, 0x33, 0x34, 0x2d, 0x58, 0x0d, 0x10, 0x04, 0xe8,
        0x00, 0x5f, 0x02,
    ];
    const BATTERY: [u8; 15] = [
        0x50, 0x20, 0xaa, 0x01, 0xba, 0xf6, 0x16, 0x33, 0x34, 0x2d, 0x58, 0x0a, 0x10, 0x01, 0x5d,
    ];

    fn advertisement(frame: &[u8]) -> Advertisement {
        Advertisement::new(ADDRESS)
            .name("MJ_HT_V1")
            .service_data(XIAOMI_ROOT_SERVICE, frame.to_vec())
    }

    #[test]
    fn test_device_is_added() {
        let mut registry = DeviceRegistry::new();
        assert_eq!(registry.observe(&Advertisement::new(ADDRESS).name("device#1")), Change::Added);

        let record = registry.get(ADDRESS).unwrap();
        assert_eq!(record.address, ADDRESS);
        assert_eq!(record.name.as_deref(), Some("device#1"));
        assert!(!record.use_custom_name);
        assert_eq!(record.battery, None);
    }

    #[test]
    fn test_device_is_added_with_custom_name() {
        let mut registry = DeviceRegistry::new().with_custom_names([(ADDRESS, "custom-name")]);
        registry.observe(&Advertisement::new(ADDRESS).name("device#1"));

        let record = registry.get(ADDRESS).unwrap();
        assert_eq!(record.name.as_deref(), Some("custom-name"));
        assert!(record.use_custom_name);
    }

    #[test]
    fn test_readings_are_merged() {
        let mut registry = DeviceRegistry::new();
        registry.observe(&advertisement(&TEMP_AND_HUMIDITY));
        assert_eq!(registry.observe(&advertisement(&BATTERY)), Change::Updated);

        let record = registry.get(ADDRESS).unwrap();
        assert_eq!(record.temperature, Some(23.2));
        assert_eq!(record.humidity, Some(60.7));
        assert_eq!(record.battery, Some(93));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_repeated_advertisement_is_unchanged() {
        let mut registry = DeviceRegistry::new();
        registry.observe(&advertisement(&BATTERY));
        assert_eq!(registry.observe(&advertisement(&BATTERY)), Change::Unchanged);
    }

    #[test]
    fn test_custom_name_is_not_overwritten() {
        let mut registry = DeviceRegistry::new();
        registry.observe(&Advertisement::new(ADDRESS).name("device#1"));
        assert!(registry.rename(ADDRESS, "custom-name"));

        registry.observe(&Advertisement::new(ADDRESS).name("device#2"));
        let record = registry.get(ADDRESS).unwrap();
        assert_eq!(record.name.as_deref(), Some("custom-name"));
        assert!(record.use_custom_name);
    }

    #[test]
    fn test_blank_rename_is_ignored() {
        let mut registry = DeviceRegistry::new();
        registry.observe(&Advertisement::new(ADDRESS).name("device#1"));
        assert!(!registry.rename(ADDRESS, "   "));

        let record = registry.get(ADDRESS).unwrap();
        assert_eq!(record.name.as_deref(), Some("device#1"));
        assert!(!record.use_custom_name);
    }

    #[test]
    fn test_rename_before_first_sighting() {
        let mut registry = DeviceRegistry::new();
        assert!(!registry.rename(ADDRESS, "kitchen"));
        registry.observe(&Advertisement::new(ADDRESS).name("device#1"));
        assert_eq!(registry.get(ADDRESS).unwrap().display_name(), "kitchen");
    }

    #[test]
    fn test_lookup_ignores_case() {
        let mut registry = DeviceRegistry::new();
        registry.observe(&Advertisement::new(ADDRESS));
        assert!(registry.get(&ADDRESS.to_lowercase()).is_some());
    }

    #[test]
    fn test_record_battery() {
        let mut registry = DeviceRegistry::new();
        registry.observe(&Advertisement::new(ADDRESS));

        assert!(registry.record_battery(ADDRESS, None, "Error(timeout)"));
        assert_eq!(
            registry.get(ADDRESS).unwrap().error.as_deref(),
            Some("Error(timeout)")
        );

        assert!(registry.record_battery(ADDRESS, Some(55), "Success"));
        let record = registry.get(ADDRESS).unwrap();
        assert_eq!(record.battery, Some(55));
        assert_eq!(record.error, None);

        assert!(!registry.record_battery("AA:BB:CC:DD:EE:FF", Some(1), "Success"));
    }

    #[test]
    fn test_malformed_frame_is_recorded() {
        let mut registry = DeviceRegistry::new();
        registry.observe(&advertisement(&[0x50, 0x20]));

        let record = registry.get(ADDRESS).unwrap();
        assert!(record.error.as_deref().unwrap().starts_with("Malformed payload"));
        assert_eq!(record.temperature, None);
    }

    #[test]
    fn test_record_serializes_timestamp() {
        let record = DeviceRecord::new(ADDRESS);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["last_update"].as_str().unwrap().contains('T'));
    }
}
