//! Platform-agnostic types for Bluetooth LCD-mirror meters.
//!
//! Multimeters, thermometers, light meters and scales in this family stream
//! a copy of their display over BLE notifications. This crate holds the
//! data model shared by the decoder, the connection layer and the CLI.
//!
//! # Features
//!
//! - Decoded display state and readings
//! - Messages written to devices (poll, init, stop)
//! - UUID constants for BLE characteristics
//! - Error types for frame decoding
//!
//! # Example
//!
//! ```
//! use blemeter_types::{Measurement, Reading};
//! use time::OffsetDateTime;
//!
//! let reading = Reading {
//!     timestamp: OffsetDateTime::UNIX_EPOCH,
//!     address: "FC:58:FA:00:00:01".into(),
//!     lcd: None,
//!     measurement: Some(Measurement::new(1.5, "DC volts")),
//! };
//! assert_eq!(reading.value(), Some(1.5));
//! ```

pub mod error;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult, hex_bytes};
pub use types::{
    DecodedLcd, Measurement, MessageSpec, Reading, UNIT_VOCABULARY, base_unit, unit_label,
};
pub use uuid as uuids;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use time::OffsetDateTime;

    fn flags(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // --- Unit label tests ---

    #[test]
    fn test_unit_label_follows_vocabulary_order() {
        let label = unit_label(&flags(&["(auto)", "volts", "AC", "milli", "positive"]));
        assert_eq!(label, "AC volts (auto)");
    }

    #[test]
    fn test_unit_label_empty_without_unit_flags() {
        assert_eq!(unit_label(&flags(&["kilo", "negative"])), "");
    }

    #[test]
    fn test_base_unit_strips_modifiers() {
        assert_eq!(base_unit("DC volts (auto) (hold)"), "DC volts");
        assert_eq!(base_unit("celsius"), "celsius");
        assert_eq!(base_unit("(hold)"), "");
    }

    // --- Measurement tests ---

    #[test]
    fn test_measurement_overload_display() {
        let m = Measurement::new(f64::INFINITY, "ohms");
        assert!(m.is_overload());
        assert_eq!(m.to_string(), "+Infinity ohms");
    }

    #[test]
    fn test_measurement_display() {
        let m = Measurement::new(-1.25, "DC amps");
        assert!(!m.is_overload());
        assert_eq!(m.to_string(), "-1.25 DC amps");
    }

    // --- Reading tests ---

    #[test]
    fn test_absent_reading_has_neither_value_nor_unit() {
        let reading = Reading {
            timestamp: OffsetDateTime::UNIX_EPOCH,
            address: "AA:BB".into(),
            lcd: None,
            measurement: None,
        };
        assert!(reading.is_absent());
        assert_eq!(reading.value(), None);
        assert_eq!(reading.unit(), None);
    }

    #[test]
    fn test_decoded_lcd_flags() {
        let mut lcd = DecodedLcd::default();
        assert!(!lcd.has("hold"));
        lcd.set("hold");
        assert!(lcd.has("hold"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_reading_serializes_rfc3339_timestamp() {
        let reading = Reading {
            timestamp: OffsetDateTime::UNIX_EPOCH,
            address: "AA:BB".into(),
            lcd: None,
            measurement: Some(Measurement::new(3.0, "volts")),
        };
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("1970-01-01T00:00:00Z"));

        let back: Reading = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reading);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_overload_reading_survives_json() {
        let reading = Reading {
            timestamp: OffsetDateTime::UNIX_EPOCH,
            address: "AA:BB".into(),
            lcd: Some(DecodedLcd::default()),
            measurement: Some(Measurement::new(f64::INFINITY, "ohms")),
        };
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains(r#""value":"+Infinity""#), "{}", json);

        let back: Reading = serde_json::from_str(&json).unwrap();
        assert!(back.measurement.as_ref().unwrap().is_overload());
        assert_eq!(back, reading);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_measurement_rejects_other_strings() {
        let err = serde_json::from_str::<Measurement>(r#"{"value":"-Infinity","unit":"ohms"}"#);
        assert!(err.is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_message_spec_serializes() {
        let msg = MessageSpec::new(uuids::WRITE_FF01, [0x57, 0x48, 0x01], std::time::Duration::from_millis(500));
        let json = serde_json::to_string(&msg).unwrap();
        let back: MessageSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_message_spec_builder() {
        let msg = MessageSpec::new(uuids::WRITE_FF01, [0x57, 0x48, 0x01], std::time::Duration::from_millis(500));
        assert!(!msg.with_response);
        let msg = msg.with_response(true);
        assert!(msg.with_response);
        assert_eq!(msg.payload, vec![0x57, 0x48, 0x01]);
    }

    #[test]
    fn test_hex_bytes() {
        assert_eq!(hex_bytes(&[0xFF, 0x57, 0x4C]), "0xFF 0x57 0x4C");
        assert_eq!(hex_bytes(&[]), "");
    }
}
