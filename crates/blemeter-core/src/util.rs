//! Identifier helpers shared by scanning and connecting.

use btleplug::platform::PeripheralId;

/// Placeholder address reported on platforms that hide real MAC addresses.
pub const HIDDEN_ADDRESS: &str = "00:00:00:00:00:00";

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms they wrap the
/// MAC address.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// The address to connect by: the MAC address, or the peripheral ID where
/// the platform hides it.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == HIDDEN_ADDRESS {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

/// Compare two MAC addresses ignoring case and separators.
pub fn addresses_match(a: &str, b: &str) -> bool {
    let strip = |s: &str| {
        s.chars()
            .filter(|c| !matches!(c, ':' | '-'))
            .map(|c| c.to_ascii_lowercase())
            .collect::<String>()
    };
    a != HIDDEN_ADDRESS && strip(a) == strip(b)
}
