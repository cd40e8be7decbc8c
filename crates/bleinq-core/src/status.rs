//! GATT status codes and transport failure messages.

use uuid::Uuid;

use bleinq_types::uuid::{describe_characteristic, describe_service};

use crate::outcome::Outcome;

pub const GATT_SUCCESS: u16 = 0x0000;
pub const GATT_READ_NOT_PERMITTED: u16 = 0x0002;
pub const GATT_WRITE_NOT_PERMITTED: u16 = 0x0003;
pub const GATT_INSUFFICIENT_AUTHENTICATION: u16 = 0x0005;
pub const GATT_REQUEST_NOT_SUPPORTED: u16 = 0x0006;
pub const GATT_INVALID_OFFSET: u16 = 0x0007;
pub const GATT_INVALID_ATTRIBUTE_LENGTH: u16 = 0x000d;
pub const GATT_INSUFFICIENT_ENCRYPTION: u16 = 0x000f;
pub const GATT_CONNECTION_CONGESTED: u16 = 0x008f;
pub const GATT_FAILURE: u16 = 0x0101;

/// Render a GATT status as `text (code)`, e.g. `read not permitted (2)`.
pub fn gatt_status_to_string(status: u16) -> String {
    let text = match status {
        GATT_SUCCESS => "success",
        GATT_CONNECTION_CONGESTED => "connection congested",
        GATT_FAILURE => "failure",
        GATT_INSUFFICIENT_AUTHENTICATION => "insufficient authentication",
        GATT_INSUFFICIENT_ENCRYPTION => "insufficient encryption",
        GATT_INVALID_ATTRIBUTE_LENGTH => "invalid attribute length",
        GATT_INVALID_OFFSET => "invalid offset",
        GATT_READ_NOT_PERMITTED => "read not permitted",
        GATT_REQUEST_NOT_SUPPORTED => "request not supported",
        GATT_WRITE_NOT_PERMITTED => "write not permitted",
        _ => "unknown",
    };
    format!("{} ({})", text, status)
}

/// `Success` for [`GATT_SUCCESS`], else a failure carrying the status text.
pub fn gatt_outcome(status: u16) -> Outcome {
    if status == GATT_SUCCESS {
        Outcome::Success
    } else {
        Outcome::failed(gatt_status_to_string(status))
    }
}

pub const CONNECTION_FAILED: &str = "Connection failed";
pub const DISCOVERY_FAILED: &str = "Discovery failed";

pub fn service_not_available(service: &Uuid) -> Outcome {
    Outcome::failed(format!("Service {} not available", describe_service(service)))
}

pub fn characteristic_not_available(characteristic: &Uuid) -> Outcome {
    Outcome::failed(format!(
        "Characteristic {} not available",
        describe_characteristic(characteristic)
    ))
}

pub fn characteristic_not_readable(characteristic: &Uuid) -> Outcome {
    Outcome::failed(format!(
        "Cannot read {} characteristic",
        describe_characteristic(characteristic)
    ))
}

#[cfg(test)]
mod tests {
    use bleinq_types::uuid::{BATTERY_LEVEL, BATTERY_SERVICE, describe_service};

    use super::*;

    #[test]
    fn test_gatt_status_strings() {
        assert_eq!(gatt_status_to_string(GATT_SUCCESS), "success (0)");
        assert_eq!(
            gatt_status_to_string(GATT_READ_NOT_PERMITTED),
            "read not permitted (2)"
        );
        assert_eq!(
            gatt_status_to_string(GATT_INSUFFICIENT_ENCRYPTION),
            "insufficient encryption (15)"
        );
        assert_eq!(
            gatt_status_to_string(GATT_CONNECTION_CONGESTED),
            "connection congested (143)"
        );
        assert_eq!(gatt_status_to_string(GATT_FAILURE), "failure (257)");
        assert_eq!(gatt_status_to_string(0x42), "unknown (66)");
    }

    #[test]
    fn test_gatt_outcome() {
        assert_eq!(gatt_outcome(GATT_SUCCESS), Outcome::Success);
        assert_eq!(
            gatt_outcome(GATT_INSUFFICIENT_AUTHENTICATION),
            Outcome::failed("insufficient authentication (5)")
        );
    }

    #[test]
    fn test_transport_messages_name_the_attribute() {
        let outcome = service_not_available(&BATTERY_SERVICE);
        assert_eq!(
            outcome.message(),
            Some(format!("Service {} not available", describe_service(&BATTERY_SERVICE)).as_str())
        );
        assert!(
            characteristic_not_readable(&BATTERY_LEVEL)
                .message()
                .unwrap()
                .starts_with("Cannot read ")
        );
        assert!(
            characteristic_not_available(&BATTERY_LEVEL)
                .message()
                .unwrap()
                .ends_with(" not available")
        );
    }
}
