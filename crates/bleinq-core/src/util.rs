//! Utility functions for bleinq-core.

use std::sync::{Mutex, MutexGuard, PoisonError};

use btleplug::platform::PeripheralId;

/// Address reported by platforms that hide the Bluetooth address.
pub const UNKNOWN_ADDRESS: &str = "00:00:00:00:00:00";

/// Lock a mutex whose critical sections never await or panic midway, so a
/// poisoned lock still guards consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms they wrap the
/// Bluetooth address.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    strip_debug_wrapper(&format!("{:?}", id))
}

fn strip_debug_wrapper(debug: &str) -> String {
    debug
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Create an identifier string from an address and peripheral ID.
///
/// Falls back to the peripheral ID where the address is hidden.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == UNKNOWN_ADDRESS {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

/// How a lookup identifier matched a peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierMatch {
    PeripheralId,
    Address,
    Name,
}

/// Match a user-supplied identifier against a peripheral.
///
/// Tries, in order: a substring of the peripheral ID, the address with or
/// without colons, and a substring of the advertised name. All comparisons
/// ignore case.
pub fn match_identifier(
    identifier: &str,
    peripheral_id: &str,
    address: &str,
    name: Option<&str>,
) -> Option<IdentifierMatch> {
    let wanted = identifier.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }

    if peripheral_id.to_lowercase().contains(&wanted) {
        return Some(IdentifierMatch::PeripheralId);
    }

    let address = address.to_lowercase();
    if address != UNKNOWN_ADDRESS
        && (address == wanted || address.replace(':', "") == wanted.replace(':', ""))
    {
        return Some(IdentifierMatch::Address);
    }

    match name {
        Some(name) if name.to_lowercase().contains(&wanted) => Some(IdentifierMatch::Name),
        _ => None,
    }
}

/// Render a 6-byte address, most significant byte first.
pub fn format_address(bytes: [u8; 6]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}
