//! Platform-agnostic types for BLE inquiry.
//!
//! This crate provides the values shared by the BLE core and its
//! front-ends. Nothing here depends on a Bluetooth stack.
//!
//! # Features
//!
//! - [`Timeout`] budgets with unit conversion and remaining-time arithmetic
//! - Xiaomi (MiBeacon) sensor advertisement decoding
//! - GATT UUID constants and well-known names
//! - Raw characteristic values with bounds-checked accessors
//!
//! # Example
//!
//! ```
//! use bleinq_types::{Advertisement, uuid::XIAOMI_ROOT_SERVICE};
//!
//! let adv = Advertisement::new("58:2D:34:33:16:F6").service_data(
//!     XIAOMI_ROOT_SERVICE,
//!     [0x50, 0x20, 0xaa, 0x01, 0xb4, 0xf6, 0x16, 0x33, 0x34, 0x2d, 0x58,
//!      0x0d, 0x10, 0x04, 0xe8, 0x00, 0x5f, 0x02],
//! );
//! let reading = adv.sensor_reading().unwrap().unwrap();
//! assert_eq!(reading.to_string(), "temperature is 23.2°C, humidity is 60.7%");
//! ```

pub mod advertisement;
pub mod error;
pub mod sensor;
pub mod timeout;
pub mod uuid;
pub mod value;

pub use advertisement::Advertisement;
pub use error::{ParseError, ParseResult};
pub use sensor::{
    Capabilities, EventKind, FrameFlags, FrameHeader, XiaomiSensorReading,
    decode_sensor_advertisement,
};
pub use timeout::{TimeUnit, Timeout};
pub use uuid as uuids;
pub use value::CharacteristicValue;
