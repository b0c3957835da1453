//! Bluetooth UUIDs for LCD-mirror meters.
//!
//! Most meters use 16-bit characteristic identifiers on the Bluetooth base
//! UUID; [`ble_uuid16`] expands them. A few use full 128-bit vendor UUIDs.

use uuid::{Uuid, uuid};

/// Expand a 16-bit assigned number onto the Bluetooth base UUID.
///
/// ```
/// use blemeter_types::uuids::ble_uuid16;
///
/// assert_eq!(
///     ble_uuid16(0xFFF4).to_string(),
///     "0000fff4-0000-1000-8000-00805f9b34fb"
/// );
/// ```
pub const fn ble_uuid16(short: u16) -> Uuid {
    Uuid::from_u128(0x0000_0000_0000_1000_8000_0080_5f9b_34fb | ((short as u128) << 96))
}

// --- Segment-display multimeters ---

/// TS04 / HP90EPD notification characteristic.
pub const NOTIFY_FFB2: Uuid = ble_uuid16(0xFFB2);

/// BT985C command characteristic.
pub const WRITE_FFB1: Uuid = ble_uuid16(0xFFB1);

/// AN9002 / V05B notification characteristic.
pub const NOTIFY_FFF4: Uuid = ble_uuid16(0xFFF4);

/// K1705 notification characteristic.
pub const NOTIFY_FFF1: Uuid = ble_uuid16(0xFFF1);

// --- Poll-driven meters ---

/// WT81B / UT383BT notification characteristic.
pub const NOTIFY_FF02: Uuid = ble_uuid16(0xFF02);

/// WT81B / UT383BT poll characteristic.
pub const WRITE_FF01: Uuid = ble_uuid16(0xFF01);

/// BT980D / BT7200 notification characteristic.
pub const NOTIFY_FFE2: Uuid = ble_uuid16(0xFFE2);

/// BT980D / BT7200 command characteristic.
pub const WRITE_FFE1: Uuid = ble_uuid16(0xFFE1);

// --- Vendor UUIDs ---

/// TP357 thermometer/hygrometer notification characteristic.
pub const TP357_NOTIFY: Uuid = uuid!("00010203-0405-0607-0809-0a0b0c0d2b10");

/// TS02 notification characteristic.
pub const TS02_NOTIFY: Uuid = uuid!("0783b03e-8535-b5a0-7140-a304d2495cb8");

/// TS02 poll characteristic.
pub const TS02_WRITE: Uuid = uuid!("0783b03e-8535-b5a0-7140-a304d2495cb9");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_uuid_expansion() {
        assert_eq!(
            NOTIFY_FFB2.to_string(),
            "0000ffb2-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            WRITE_FF01.to_string(),
            "0000ff01-0000-1000-8000-00805f9b34fb"
        );
    }

    #[test]
    fn test_vendor_uuids_distinct() {
        assert_ne!(TS02_NOTIFY, TS02_WRITE);
        assert_ne!(TP357_NOTIFY, NOTIFY_FFB2);
    }
}
