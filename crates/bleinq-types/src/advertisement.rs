//! Platform-agnostic view of a received BLE advertisement.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseResult;
use crate::sensor::{XiaomiSensorReading, decode_sensor_advertisement};
use crate::uuid::XIAOMI_ROOT_SERVICE;

/// One advertisement packet as delivered by a scanner.
///
/// Duplicates are delivered as-is; deduplication is up to the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Advertisement {
    /// Bluetooth address (may be all zeros on platforms that hide it).
    pub address: String,
    /// Stable connection identifier: the address, or a platform id.
    pub identifier: String,
    /// Advertised local name.
    pub name: Option<String>,
    pub rssi: Option<i16>,
    /// Service data keyed by service UUID.
    pub service_data: HashMap<Uuid, Vec<u8>>,
    /// Advertised service UUIDs.
    pub services: Vec<Uuid>,
}

impl Advertisement {
    /// Create an advertisement whose identifier is its address.
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            identifier: address.clone(),
            address,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    #[must_use]
    pub fn service_data(mut self, service: Uuid, data: impl Into<Vec<u8>>) -> Self {
        self.service_data.insert(service, data.into());
        self
    }

    /// The Xiaomi sensor frame, if the advertisement carries one.
    pub fn sensor_payload(&self) -> Option<&[u8]> {
        self.service_data
            .get(&XIAOMI_ROOT_SERVICE)
            .map(Vec::as_slice)
    }

    /// Decode the Xiaomi sensor frame, if present.
    ///
    /// Returns `None` when there is no frame, and `Some(Err(_))` when the
    /// frame is malformed.
    pub fn sensor_reading(&self) -> Option<ParseResult<XiaomiSensorReading>> {
        self.sensor_payload().map(decode_sensor_advertisement)
    }

    /// `address (name)` when a non-blank name is known, else the address.
    pub fn description(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("{} ({})", self.identifier, name),
            _ => self.identifier.clone(),
        }
    }
}
