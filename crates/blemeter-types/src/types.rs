//! Core types for decoded meter data.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Display vocabulary for unit labels, in output order.
///
/// A unit label is the space-joined subset of these names whose flags are
/// present, always in this order regardless of the order flags were set.
pub const UNIT_VOCABULARY: &[&str] = &[
    "DC",
    "AC",
    "volts",
    "amps",
    "ohms",
    "NCV",
    "diode",
    "continuity",
    "celsius",
    "fahrenheit",
    "farads",
    "hertz",
    "%duty",
    "lux",
    "fc",
    "degrees",
    "%RH",
    "grams",
    "(auto)",
    "(hold)",
    "(relative)",
    "(maximum)",
    "(minimum)",
    "(low_batt)",
];

/// Build the unit label for a set of present flags.
///
/// ```
/// use std::collections::BTreeSet;
/// use blemeter_types::unit_label;
///
/// let flags: BTreeSet<String> = ["(hold)", "volts", "DC"].iter().map(|s| s.to_string()).collect();
/// assert_eq!(unit_label(&flags), "DC volts (hold)");
/// ```
#[must_use]
pub fn unit_label(flags: &BTreeSet<String>) -> String {
    UNIT_VOCABULARY
        .iter()
        .filter(|mode| flags.contains(**mode))
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip display modifiers such as `(hold)` from a unit label.
///
/// `"DC volts (auto) (hold)"` becomes `"DC volts"`. Used to group samples
/// that differ only by a transient display mode.
#[must_use]
pub fn base_unit(label: &str) -> &str {
    label.split('(').next().unwrap_or(label).trim()
}

/// The state of a meter's display as recovered from one frame.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DecodedLcd {
    /// Names of every flag that is set.
    pub flags: BTreeSet<String>,
    /// Raw digit string as shown on the display, if the model has digits.
    pub digits: Option<String>,
    /// Directly encoded temperature (models without a segment display).
    pub temperature: Option<f64>,
    /// Directly encoded illuminance in lux.
    pub lux: Option<f64>,
    /// Directly encoded relative humidity in percent.
    pub humidity: Option<f64>,
    /// Secondary reading selected by a mode byte.
    pub minor_reading: Option<f64>,
    /// Unit of the secondary reading.
    pub minor_unit: Option<String>,
    /// Bit or hex rendering of the frame, for models that are not yet mapped.
    pub raw: Option<String>,
}

impl DecodedLcd {
    /// Check whether a flag is set.
    pub fn has(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    /// Set a flag.
    pub fn set(&mut self, flag: &str) {
        self.flags.insert(flag.to_string());
    }
}

/// A numeric value paired with its unit label.
///
/// Value and unit always travel together: a reading either has both or
/// neither, which this type makes impossible to violate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurement {
    /// The value. Overload is represented as positive infinity.
    #[cfg_attr(feature = "serde", serde(with = "overload_value"))]
    pub value: f64,
    /// Unit label, e.g. `"DC volts (auto)"`.
    pub unit: String,
}

/// Serde form of a measurement value: a number, or `"+Infinity"` for overload.
#[cfg(feature = "serde")]
mod overload_value {
    use serde::{Deserialize, Deserializer, Serializer, de};

    const OVERLOAD: &str = "+Infinity";

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if *value == f64::INFINITY {
            serializer.serialize_str(OVERLOAD)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) if text == OVERLOAD => Ok(f64::INFINITY),
            Repr::Text(text) => Err(de::Error::invalid_value(
                de::Unexpected::Str(&text),
                &"a number or \"+Infinity\"",
            )),
        }
    }
}

impl Measurement {
    /// Create a new measurement.
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    /// Whether the meter reported an overload.
    pub fn is_overload(&self) -> bool {
        self.value == f64::INFINITY
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_overload() {
            write!(f, "+Infinity {}", self.unit)
        } else {
            write!(f, "{} {}", self.value, self.unit)
        }
    }
}

/// One record in the reading stream.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// When the frame arrived (UTC).
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Address of the device that sent the frame.
    pub address: String,
    /// Decoded display state, absent when the frame could not be decoded.
    pub lcd: Option<DecodedLcd>,
    /// Value and unit, absent when the frame carries no usable number.
    pub measurement: Option<Measurement>,
}

impl Reading {
    /// Whether this record carries a value.
    pub fn is_absent(&self) -> bool {
        self.measurement.is_none()
    }

    /// The value, if any.
    pub fn value(&self) -> Option<f64> {
        self.measurement.as_ref().map(|m| m.value)
    }

    /// The unit label, if any.
    pub fn unit(&self) -> Option<&str> {
        self.measurement.as_ref().map(|m| m.unit.as_str())
    }
}

/// A message written to a device: poll, init, or stop.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MessageSpec {
    /// Characteristic the payload is written to.
    pub channel: Uuid,
    /// Bytes to write.
    pub payload: Vec<u8>,
    /// Poll period, or settle delay for init and stop messages.
    pub interval: Duration,
    /// Whether the write requires a transport acknowledgment.
    pub with_response: bool,
}

impl MessageSpec {
    /// Create a message that is written without acknowledgment.
    pub fn new(channel: Uuid, payload: impl Into<Vec<u8>>, interval: Duration) -> Self {
        Self {
            channel,
            payload: payload.into(),
            interval,
            with_response: false,
        }
    }

    /// Require a transport acknowledgment for each write.
    #[must_use]
    pub fn with_response(mut self, with_response: bool) -> Self {
        self.with_response = with_response;
        self
    }
}
