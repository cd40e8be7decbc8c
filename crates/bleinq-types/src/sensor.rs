//! Xiaomi (MiBeacon) sensor advertisement decoding.
//!
//! Xiaomi environmental sensors broadcast readings as service data under
//! the `0xfe95` service UUID. A frame looks like:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 2 | Frame control (LE): top 4 bits version, low 12 bits flags |
//! | 2 | 2 | Product id (LE) |
//! | 4 | 1 | Frame counter |
//! | 5 | 6 | MAC address, reversed (if `HAS_MAC_ADDRESS`) |
//! | .. | 1 | Capabilities (if `HAS_CAPABILITIES`) |
//! | .. | 2+1+n | Event id (LE), data length, data (if `HAS_EVENT`) |
//!
//! Every field read is bounds-checked; a payload shorter than its header
//! implies yields [`ParseError::MalformedPayload`].

use std::fmt;

use bytes::Buf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ParseError, ParseResult};

/// Minimum frame length: frame control, product id and frame counter.
pub const MIN_FRAME_LEN: usize = 5;

/// The 12-bit flag field of a frame control word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct FrameFlags(u16);

impl FrameFlags {
    pub const NEW_FACTORY: u16 = 1 << 0;
    pub const CONNECTED: u16 = 1 << 1;
    pub const CENTRAL: u16 = 1 << 2;
    pub const ENCRYPTED: u16 = 1 << 3;
    pub const HAS_MAC_ADDRESS: u16 = 1 << 4;
    pub const HAS_CAPABILITIES: u16 = 1 << 5;
    pub const HAS_EVENT: u16 = 1 << 6;
    pub const HAS_CUSTOM_DATA: u16 = 1 << 7;
    pub const HAS_SUBTITLE: u16 = 1 << 8;
    pub const IS_BINDING_FRAME: u16 = 1 << 9;

    /// Create flags from raw bits; anything above bit 11 is dropped.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & 0x0fff)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    const fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub const fn is_new_factory(self) -> bool {
        self.has(Self::NEW_FACTORY)
    }

    pub const fn is_connected(self) -> bool {
        self.has(Self::CONNECTED)
    }

    pub const fn is_central(self) -> bool {
        self.has(Self::CENTRAL)
    }

    pub const fn is_encrypted(self) -> bool {
        self.has(Self::ENCRYPTED)
    }

    pub const fn has_mac_address(self) -> bool {
        self.has(Self::HAS_MAC_ADDRESS)
    }

    pub const fn has_capabilities(self) -> bool {
        self.has(Self::HAS_CAPABILITIES)
    }

    pub const fn has_event(self) -> bool {
        self.has(Self::HAS_EVENT)
    }

    pub const fn has_custom_data(self) -> bool {
        self.has(Self::HAS_CUSTOM_DATA)
    }

    pub const fn has_subtitle(self) -> bool {
        self.has(Self::HAS_SUBTITLE)
    }

    pub const fn is_binding_frame(self) -> bool {
        self.has(Self::IS_BINDING_FRAME)
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FrameHeader {
    /// Protocol version (top 4 bits of frame control).
    pub version: u8,
    pub flags: FrameFlags,
    /// Product id, identifying the device model.
    pub product_id: u16,
    pub frame_counter: u8,
}

/// Device capability byte, present when `HAS_CAPABILITIES` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Capabilities {
    pub connectible: bool,
    pub central_capable: bool,
    pub encryptable: bool,
    /// Either of the two I/O capability bits (3 and 4).
    pub io: bool,
}

impl Capabilities {
    const CONNECTIBLE: u8 = 1 << 0;
    const CENTRAL_CAPABLE: u8 = 1 << 1;
    const ENCRYPTABLE: u8 = 1 << 2;
    const IO: u8 = (1 << 3) | (1 << 4);

    pub fn from_byte(value: u8) -> Self {
        Self {
            connectible: value & Self::CONNECTIBLE != 0,
            central_capable: value & Self::CENTRAL_CAPABLE != 0,
            encryptable: value & Self::ENCRYPTABLE != 0,
            io: value & Self::IO != 0,
        }
    }
}

/// Event carried by a frame, identified by its 16-bit type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EventKind {
    /// 0x1004: signed 16-bit, tenths of °C.
    Temperature,
    /// 0x1005: status byte then temperature byte in whole °C.
    KettleStatusAndTemperature,
    /// 0x1006: unsigned 16-bit, tenths of %.
    Humidity,
    /// 0x1007: illuminance in lux.
    Illuminance,
    /// 0x1008: soil moisture in %.
    Moisture,
    /// 0x1009: soil conductivity in µS/cm.
    Fertility,
    /// 0x100A: battery in %.
    Battery,
    /// 0x100D: temperature then humidity.
    TemperatureAndHumidity,
    /// Any other event id; the cursor still skips its data.
    Unknown(u16),
}

impl EventKind {
    pub fn from_id(id: u16) -> Self {
        match id {
            0x1004 => EventKind::Temperature,
            0x1005 => EventKind::KettleStatusAndTemperature,
            0x1006 => EventKind::Humidity,
            0x1007 => EventKind::Illuminance,
            0x1008 => EventKind::Moisture,
            0x1009 => EventKind::Fertility,
            0x100A => EventKind::Battery,
            0x100D => EventKind::TemperatureAndHumidity,
            other => EventKind::Unknown(other),
        }
    }

    pub fn id(self) -> u16 {
        match self {
            EventKind::Temperature => 0x1004,
            EventKind::KettleStatusAndTemperature => 0x1005,
            EventKind::Humidity => 0x1006,
            EventKind::Illuminance => 0x1007,
            EventKind::Moisture => 0x1008,
            EventKind::Fertility => 0x1009,
            EventKind::Battery => 0x100A,
            EventKind::TemperatureAndHumidity => 0x100D,
            EventKind::Unknown(id) => id,
        }
    }
}

/// A sensor reading decoded from one advertisement frame.
///
/// Only the fields implied by the frame's flags and recognized event are
/// populated; everything else is `None`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct XiaomiSensorReading {
    pub header: FrameHeader,
    /// Colon-separated lowercase MAC address, most significant byte first.
    pub mac_address: Option<String>,
    pub capabilities: Option<Capabilities>,
    pub event: Option<EventKind>,
    /// Temperature in °C.
    pub temperature: Option<f64>,
    /// Relative humidity in %.
    pub humidity: Option<f64>,
    /// Battery level in %.
    pub battery: Option<u8>,
    /// Illuminance in lux. Only the low byte of the wire value is kept.
    pub luminance: Option<u8>,
    /// Soil moisture in %.
    pub moisture: Option<u8>,
    /// Soil conductivity in µS/cm. Only the low byte of the wire value is kept.
    pub fertility: Option<u8>,
}

impl XiaomiSensorReading {
    /// Decode a frame. See [`decode_sensor_advertisement`].
    pub fn decode(bytes: &[u8]) -> ParseResult<Self> {
        decode_sensor_advertisement(bytes)
    }

    /// Whether no sensor value was decoded.
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.humidity.is_none()
            && self.battery.is_none()
            && self.luminance.is_none()
            && self.moisture.is_none()
            && self.fertility.is_none()
    }
}

impl fmt::Display for XiaomiSensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(t) = self.temperature {
            parts.push(format!("temperature is {:.1}°C", t));
        }
        if let Some(h) = self.humidity {
            parts.push(format!("humidity is {:.1}%", h));
        }
        if let Some(l) = self.luminance {
            parts.push(format!("luminance is {} lx", l));
        }
        if let Some(m) = self.moisture {
            parts.push(format!("moisture is {}%", m));
        }
        if let Some(c) = self.fertility {
            parts.push(format!("fertility is {} µS/cm", c));
        }
        if let Some(b) = self.battery {
            parts.push(format!("battery is {}%", b));
        }
        f.write_str(&parts.join(", "))
    }
}

fn ensure(buf: &[u8], needed: usize, field: &'static str) -> ParseResult<()> {
    if buf.remaining() < needed {
        return Err(ParseError::malformed(field, needed, buf.remaining()));
    }
    Ok(())
}

/// Decode a Xiaomi sensor advertisement payload.
///
/// The event data block is always skipped by its declared length, whether
/// or not the event id is recognized.
///
/// # Encrypted frames
///
/// When [`FrameFlags::is_encrypted`] is set the event data is ciphertext.
/// It is not interpreted: the reading carries the header, MAC address and
/// [`EventKind`], but no sensor values. Decoding those bytes as plaintext,
/// as a flag-blind decoder would, yields arbitrary numbers.
///
/// # Errors
///
/// Returns [`ParseError::MalformedPayload`] when the payload is shorter
/// than its header, or than a field or event block its flags declare.
///
/// # Example
///
/// ```
/// use bleinq_types::decode_sensor_advertisement;
///
/// let bytes = [
///     0x50, 0x20, 0xaa, 0x01, 0xba, 0xf6, 0x16, 0x33, 0x34, 0x2d, 0x58,
///     0x0a, 0x10, 0x01, 0x5d,
/// ];
/// let reading = decode_sensor_advertisement(&bytes).unwrap();
/// assert_eq!(reading.battery, Some(93));
/// assert_eq!(reading.to_string(), "battery is 93%");
/// ```
pub fn decode_sensor_advertisement(bytes: &[u8]) -> ParseResult<XiaomiSensorReading> {
    let mut buf = bytes;

    ensure(buf, MIN_FRAME_LEN, "frame header")?;
    let frame_control = buf.get_u16_le();
    let header = FrameHeader {
        version: (frame_control >> 12) as u8,
        flags: FrameFlags::from_bits(frame_control),
        product_id: buf.get_u16_le(),
        frame_counter: buf.get_u8(),
    };

    let mut reading = XiaomiSensorReading {
        header,
        mac_address: None,
        capabilities: None,
        event: None,
        temperature: None,
        humidity: None,
        battery: None,
        luminance: None,
        moisture: None,
        fertility: None,
    };

    if header.flags.has_mac_address() {
        ensure(buf, 6, "mac address")?;
        let mut mac = [0u8; 6];
        buf.copy_to_slice(&mut mac);
        reading.mac_address = Some(
            mac.iter()
                .rev()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(":"),
        );
    }

    if header.flags.has_capabilities() {
        ensure(buf, 1, "capabilities")?;
        reading.capabilities = Some(Capabilities::from_byte(buf.get_u8()));
    }

    if header.flags.has_event() {
        ensure(buf, 3, "event header")?;
        let kind = EventKind::from_id(buf.get_u16_le());
        let length = usize::from(buf.get_u8());
        ensure(buf, length, "event data")?;
        // Custom data, subtitle and MIC bytes after the event are not decoded.
        let (data, _trailing) = buf.split_at(length);

        reading.event = Some(kind);
        if !header.flags.is_encrypted() {
            apply_event(&mut reading, kind, data)?;
        }
    }

    Ok(reading)
}

fn apply_event(reading: &mut XiaomiSensorReading, kind: EventKind, data: &[u8]) -> ParseResult<()> {
    let mut data = data;
    match kind {
        EventKind::Temperature => {
            ensure(data, 2, "temperature")?;
            reading.temperature = Some(f64::from(data.get_i16_le()) / 10.0);
        }
        EventKind::Humidity => {
            ensure(data, 2, "humidity")?;
            reading.humidity = Some(f64::from(data.get_u16_le()) / 10.0);
        }
        EventKind::TemperatureAndHumidity => {
            ensure(data, 4, "temperature and humidity")?;
            reading.temperature = Some(f64::from(data.get_i16_le()) / 10.0);
            reading.humidity = Some(f64::from(data.get_u16_le()) / 10.0);
        }
        EventKind::KettleStatusAndTemperature => {
            ensure(data, 2, "kettle temperature")?;
            data.advance(1);
            reading.temperature = Some(f64::from(data.get_u8()));
        }
        EventKind::Battery => {
            ensure(data, 1, "battery")?;
            reading.battery = Some(data.get_u8());
        }
        EventKind::Illuminance => {
            ensure(data, 1, "illuminance")?;
            reading.luminance = Some(data.get_u8());
        }
        EventKind::Moisture => {
            ensure(data, 1, "moisture")?;
            reading.moisture = Some(data.get_u8());
        }
        EventKind::Fertility => {
            ensure(data, 1, "fertility")?;
            reading.fertility = Some(data.get_u8());
        }
        EventKind::Unknown(_) => {}
    }
    Ok(())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Decoding random bytes should never panic.
        #[test]
        fn decode_never_panics(data: Vec<u8>) {
            let _ = decode_sensor_advertisement(&data);
        }

        /// Frames with every optional section flagged should never panic.
        #[test]
        fn decode_full_flags_never_panics(data in proptest::collection::vec(any::<u8>(), 0..32)) {
            let mut frame = vec![0x70, 0x20, 0x00, 0x00, 0x00];
            frame.extend(data);
            let _ = decode_sensor_advertisement(&frame);
        }

        /// A truncated copy of a valid frame is either decoded or malformed.
        #[test]
        fn truncated_frames_are_malformed(cut in 0usize..18) {
            let frame = [
                0x50, 0x20, 0xaa, 0x01, 0xb4, 0xf6, 0x16, 0x33, 0x34, 0x2d, 0x58, 0x0d, 0x10,
                0x04, 0xe8, 0x00, 0x5f, 0x02,
            ];
            let result = decode_sensor_advertisement(&frame[..cut]);
            let is_malformed = matches!(result, Err(ParseError::MalformedPayload { .. }));
            prop_assert!(is_malformed);
        }
    }
}
