//! Bluetooth UUIDs for GATT service and characteristic lookup.
//!
//! Standard 16-bit identifiers are expanded into the Bluetooth base UUID
//! `0000xxxx-0000-1000-8000-00805f9b34fb`. Vendor services used by Xiaomi
//! sensors and Nordic bootloaders are full 128-bit constants.

use uuid::{Uuid, uuid};

/// The Bluetooth base UUID with a zero 16-bit slot.
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Expand a 16-bit SIG-assigned identifier into a full 128-bit UUID.
///
/// # Example
///
/// ```
/// use bleinq_types::uuid::standard_uuid;
///
/// assert_eq!(
///     standard_uuid(0x180f).to_string(),
///     "0000180f-0000-1000-8000-00805f9b34fb"
/// );
/// ```
pub const fn standard_uuid(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// Recover the 16-bit identifier from a UUID built on the Bluetooth base.
pub fn short_uuid(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let short = (value >> 96) as u16;
    (value == standard_uuid(short).as_u128()).then_some(short)
}

// --- Standard BLE Service UUIDs ---

pub const GENERIC_ACCESS: Uuid = standard_uuid(0x1800);
pub const GENERIC_ATTRIBUTE: Uuid = standard_uuid(0x1801);
pub const IMMEDIATE_ALERT: Uuid = standard_uuid(0x1802);
pub const LINK_LOSS: Uuid = standard_uuid(0x1803);
pub const TX_POWER: Uuid = standard_uuid(0x1804);
pub const CURRENT_TIME: Uuid = standard_uuid(0x1805);
pub const REFERENCE_TIME_UPDATE: Uuid = standard_uuid(0x1806);
pub const NEXT_DST_CHANGE: Uuid = standard_uuid(0x1807);
pub const GLUCOSE: Uuid = standard_uuid(0x1808);
pub const HEALTH_THERMOMETER: Uuid = standard_uuid(0x1809);
pub const DEVICE_INFORMATION: Uuid = standard_uuid(0x180a);
pub const HEART_RATE: Uuid = standard_uuid(0x180d);
pub const PHONE_ALERT_STATUS: Uuid = standard_uuid(0x180e);

/// Battery service.
pub const BATTERY_SERVICE: Uuid = standard_uuid(0x180f);

pub const BLOOD_PRESSURE: Uuid = standard_uuid(0x1810);
pub const ALERT_NOTIFICATION: Uuid = standard_uuid(0x1811);
pub const HUMAN_INTERFACE_DEVICE: Uuid = standard_uuid(0x1812);
pub const SCAN_PARAMETERS: Uuid = standard_uuid(0x1813);
pub const RUNNING_SPEED_AND_CADENCE: Uuid = standard_uuid(0x1814);
pub const AUTOMATION_IO: Uuid = standard_uuid(0x1815);
pub const CYCLING_SPEED_AND_CADENCE: Uuid = standard_uuid(0x1816);
pub const CYCLING_POWER: Uuid = standard_uuid(0x1818);
pub const LOCATION_AND_NAVIGATION: Uuid = standard_uuid(0x1819);

/// Environmental Sensing service (temperature, humidity and friends).
pub const ENVIRONMENTAL_SENSING: Uuid = standard_uuid(0x181a);

pub const BODY_COMPOSITION: Uuid = standard_uuid(0x181b);
pub const USER_DATA: Uuid = standard_uuid(0x181c);
pub const WEIGHT_SCALE: Uuid = standard_uuid(0x181d);
pub const BOND_MANAGEMENT: Uuid = standard_uuid(0x181e);
pub const CONTINUOUS_GLUCOSE_MONITORING: Uuid = standard_uuid(0x181f);
pub const INTERNET_PROTOCOL_SUPPORT: Uuid = standard_uuid(0x1820);
pub const INDOOR_POSITIONING: Uuid = standard_uuid(0x1821);
pub const PULSE_OXIMETER: Uuid = standard_uuid(0x1822);
pub const HTTP_PROXY: Uuid = standard_uuid(0x1823);
pub const TRANSPORT_DISCOVERY: Uuid = standard_uuid(0x1824);
pub const OBJECT_TRANSFER: Uuid = standard_uuid(0x1825);
pub const FITNESS_MACHINE: Uuid = standard_uuid(0x1826);
pub const MESH_PROVISIONING: Uuid = standard_uuid(0x1827);
pub const MESH_PROXY: Uuid = standard_uuid(0x1828);
pub const RECONNECTION_CONFIGURATION: Uuid = standard_uuid(0x1829);
pub const INSULIN_DELIVERY: Uuid = standard_uuid(0x183a);
pub const BINARY_SENSOR: Uuid = standard_uuid(0x183b);
pub const EMERGENCY_CONFIGURATION: Uuid = standard_uuid(0x183c);

// --- Standard BLE Characteristic UUIDs ---

/// Device name characteristic.
pub const DEVICE_NAME: Uuid = standard_uuid(0x2a00);

/// Appearance characteristic.
pub const APPEARANCE: Uuid = standard_uuid(0x2a01);

/// Battery level characteristic (percentage, one unsigned byte).
pub const BATTERY_LEVEL: Uuid = standard_uuid(0x2a19);

/// Model number string characteristic.
pub const MODEL_NUMBER: Uuid = standard_uuid(0x2a24);

/// Firmware revision string characteristic.
pub const FIRMWARE_REVISION: Uuid = standard_uuid(0x2a26);

/// Manufacturer name string characteristic.
pub const MANUFACTURER_NAME: Uuid = standard_uuid(0x2a29);

// --- Vendor Service UUIDs ---

/// Xiaomi root service; its advertised service data carries sensor frames.
pub const XIAOMI_ROOT_SERVICE: Uuid = uuid!("0000fe95-0000-1000-8000-00805f9b34fb");

/// Xiaomi data service exposed over GATT.
pub const XIAOMI_DATA_SERVICE: Uuid = uuid!("00001204-0000-1000-8000-00805f9b34fb");

/// Xiaomi Mijia data service exposed over GATT.
pub const XIAOMI_MIJIA_DATA_SERVICE: Uuid = uuid!("226c0000-6476-4566-7562-66734470666d");

/// Nordic Semiconductor legacy DFU service.
pub const NORDIC_DEVICE_FIRMWARE_UPDATE: Uuid = uuid!("00001530-1212-efde-1523-785feabcd123");

static SERVICE_NAMES: &[(Uuid, &str)] = &[
    (GENERIC_ACCESS, "Generic Access"),
    (GENERIC_ATTRIBUTE, "Generic Attribute"),
    (IMMEDIATE_ALERT, "Immediate Alert"),
    (LINK_LOSS, "Link Loss"),
    (TX_POWER, "Tx Power"),
    (CURRENT_TIME, "Current Time"),
    (REFERENCE_TIME_UPDATE, "Reference Time Update"),
    (NEXT_DST_CHANGE, "Next DST Change"),
    (GLUCOSE, "Glucose"),
    (HEALTH_THERMOMETER, "Health Thermometer"),
    (DEVICE_INFORMATION, "Device Information"),
    (HEART_RATE, "Heart Rate"),
    (PHONE_ALERT_STATUS, "Phone Alert Status"),
    (BATTERY_SERVICE, "Battery Service"),
    (BLOOD_PRESSURE, "Blood Pressure"),
    (ALERT_NOTIFICATION, "Alert Notification"),
    (HUMAN_INTERFACE_DEVICE, "Human Interface Device"),
    (SCAN_PARAMETERS, "Scan Parameters"),
    (RUNNING_SPEED_AND_CADENCE, "Running Speed and Cadence"),
    (AUTOMATION_IO, "Automation IO"),
    (CYCLING_SPEED_AND_CADENCE, "Cycling Speed and Cadence"),
    (CYCLING_POWER, "Cycling Power"),
    (LOCATION_AND_NAVIGATION, "Location and Navigation"),
    (ENVIRONMENTAL_SENSING, "Environmental Sensing"),
    (BODY_COMPOSITION, "Body Composition"),
    (USER_DATA, "User Data"),
    (WEIGHT_SCALE, "Weight Scale"),
    (BOND_MANAGEMENT, "Bond Management"),
    (CONTINUOUS_GLUCOSE_MONITORING, "Continuous Glucose Monitoring"),
    (INTERNET_PROTOCOL_SUPPORT, "Internet Protocol Support"),
    (INDOOR_POSITIONING, "Indoor Positioning"),
    (PULSE_OXIMETER, "Pulse Oximeter"),
    (HTTP_PROXY, "HTTP Proxy"),
    (TRANSPORT_DISCOVERY, "Transport Discovery"),
    (OBJECT_TRANSFER, "Object Transfer"),
    (FITNESS_MACHINE, "Fitness Machine"),
    (MESH_PROVISIONING, "Mesh Provisioning"),
    (MESH_PROXY, "Mesh Proxy"),
    (RECONNECTION_CONFIGURATION, "Reconnection Configuration"),
    (INSULIN_DELIVERY, "Insulin Delivery"),
    (BINARY_SENSOR, "Binary Sensor"),
    (EMERGENCY_CONFIGURATION, "Emergency Configuration"),
    (XIAOMI_ROOT_SERVICE, "Xiaomi Root Service"),
    (XIAOMI_DATA_SERVICE, "Xiaomi Data Service"),
    (XIAOMI_MIJIA_DATA_SERVICE, "Xiaomi Mijia Data Service"),
    (NORDIC_DEVICE_FIRMWARE_UPDATE, "Nordic Device Firmware Update"),
];

static CHARACTERISTIC_NAMES: &[(Uuid, &str)] = &[
    (DEVICE_NAME, "Device Name"),
    (APPEARANCE, "Appearance"),
    (BATTERY_LEVEL, "Battery Level"),
    (MODEL_NUMBER, "Model Number String"),
    (FIRMWARE_REVISION, "Firmware Revision String"),
    (MANUFACTURER_NAME, "Manufacturer Name String"),
];

/// Well-known name of a service, if any.
pub fn service_name(uuid: &Uuid) -> Option<&'static str> {
    SERVICE_NAMES
        .iter()
        .find(|(known, _)| known == uuid)
        .map(|(_, name)| *name)
}

/// Well-known name of a characteristic, if any.
pub fn characteristic_name(uuid: &Uuid) -> Option<&'static str> {
    CHARACTERISTIC_NAMES
        .iter()
        .find(|(known, _)| known == uuid)
        .map(|(_, name)| *name)
}

/// Service name for messages, falling back to the UUID string.
pub fn describe_service(uuid: &Uuid) -> String {
    service_name(uuid)
        .map(str::to_string)
        .unwrap_or_else(|| uuid.to_string())
}

/// Characteristic name for messages, falling back to the UUID string.
pub fn describe_characteristic(uuid: &Uuid) -> String {
    characteristic_name(uuid)
        .map(str::to_string)
        .unwrap_or_else(|| uuid.to_string())
}
