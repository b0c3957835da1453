//! Frame decoding for LCD-mirror meters.
//!
//! One engine, [`Decoder`], handles every model. The differences between
//! models live in a [`ModelConfig`]: frame template, flag bits, segment
//! layout, obfuscation key, packet reassembly and how readings are built.
//!
//! Decoding never fails. A frame that does not fit the model yields a
//! single absent output and a `warn!` with the model and the frame bytes.
//!
//! # Example
//!
//! ```
//! use blemeter_core::decoder::Decoder;
//!
//! let decoder = Decoder::for_model("TP357").unwrap();
//! let outputs = decoder.decode(&[0xC2, 0x00, 0x00, 0xEB, 0x00, 0x2D, 0x2C]);
//! let temperature = outputs[0].measurement.as_ref().unwrap();
//! assert_eq!(temperature.unit, "celsius");
//! assert!((temperature.value - 23.5).abs() < 1e-9);
//! ```

pub mod config;
pub mod models;
pub mod pattern;
pub mod segments;

use std::sync::Mutex;

use tracing::{debug, warn};

use blemeter_types::{DecodedLcd, Measurement, ParseError, ParseResult, hex_bytes, unit_label};

pub use config::{
    DigitSource, FlagSpec, Fixup, Implication, MinorMode, MinorScale, ModelConfig, Output,
    Override, RawRender, Reassembly, SCALING,
};
pub use models::{
    Bt985cCommand, MODEL_ALIASES, MODEL_NAMES, bt980d_message, bt985c_message, canonical_model,
    model_config,
};
pub use pattern::FramePattern;
pub use segments::SegmentTable;

use crate::error::{Error, Result};

/// One reading decoded from a frame.
///
/// `measurement` is `None` for absent readings. `lcd` is `None` when the
/// frame was rejected before its display state could be recovered.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeOutput {
    /// Recovered display state.
    pub lcd: Option<DecodedLcd>,
    /// Value and unit.
    pub measurement: Option<Measurement>,
}

impl DecodeOutput {
    /// Output for a frame that produced nothing.
    pub fn absent() -> Self {
        Self {
            lcd: None,
            measurement: None,
        }
    }

    /// Whether the output carries neither display state nor value.
    pub fn is_absent(&self) -> bool {
        self.lcd.is_none() && self.measurement.is_none()
    }
}

/// Outcome of the framing stage.
enum Framed {
    /// Vendor chatter or the first half of a split frame.
    Silent,
    /// A complete frame ready for interpretation.
    Frame(Vec<u8>),
}

/// Decoder for one device.
///
/// Holds the reassembly buffer for two-part models, so each device needs
/// its own instance.
#[derive(Debug)]
pub struct Decoder {
    config: ModelConfig,
    pending: Mutex<Vec<u8>>,
}

impl Decoder {
    /// Create a decoder from a configuration.
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Create a decoder for a model name or alias.
    pub fn for_model(name: &str) -> Result<Self> {
        model_config(name)
            .map(Self::new)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    /// Canonical model name.
    pub fn model(&self) -> &'static str {
        self.config.model
    }

    /// The configuration this decoder interprets.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Decode one notification payload.
    ///
    /// Always returns at least one output. Identical frames give identical
    /// results, except for the first half of a two-part frame which is
    /// buffered.
    pub fn decode(&self, frame: &[u8]) -> Vec<DecodeOutput> {
        let frame = match self.frame(frame) {
            Ok(Framed::Silent) => return vec![DecodeOutput::absent()],
            Ok(Framed::Frame(frame)) => frame,
            Err(e) => {
                warn!("{}", e);
                return vec![DecodeOutput::absent()];
            }
        };
        match self.interpret(&frame) {
            Ok(outputs) => outputs,
            Err(e) => {
                warn!("{}", e);
                vec![DecodeOutput::absent()]
            }
        }
    }

    fn mismatch(&self, frame: &[u8]) -> ParseError {
        ParseError::ShapeMismatch {
            model: self.config.model.to_string(),
            hex: hex_bytes(frame),
        }
    }

    /// Filter, reassemble, resynchronise, check the shape, unwhiten.
    fn frame(&self, data: &[u8]) -> ParseResult<Framed> {
        let config = &self.config;
        if config.ignore.iter().any(|p| p.matches(data)) {
            debug!("{}: ignoring {}", config.model, hex_bytes(data));
            return Ok(Framed::Silent);
        }

        let mut frame = match config.reassembly {
            Reassembly::None => data.to_vec(),
            Reassembly::TwoPart { first, second } => {
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                if data.len() == first {
                    *pending = data.to_vec();
                    return Ok(Framed::Silent);
                }
                let buffered = std::mem::take(&mut *pending);
                if data.len() != second || buffered.len() != first {
                    return Err(self.mismatch(data));
                }
                let mut joined = buffered;
                joined.extend_from_slice(data);
                joined
            }
        };

        for fixup in &config.fixups {
            match fixup {
                Fixup::Append { when, byte } if when.matches(&frame) => frame.push(*byte),
                Fixup::DropFirst { when } if when.matches(&frame) => {
                    frame.remove(0);
                }
                _ => {}
            }
        }

        let within_limits = config
            .limits
            .iter()
            .all(|&(index, max)| frame.get(index).is_some_and(|b| *b <= max));
        if !config.pattern.matches(&frame) || !within_limits {
            return Err(self.mismatch(&frame));
        }

        for (byte, key) in frame.iter_mut().zip(config.whitening) {
            *byte ^= key;
        }
        Ok(Framed::Frame(frame))
    }

    /// Turn a validated frame into readings.
    fn interpret(&self, frame: &[u8]) -> ParseResult<Vec<DecodeOutput>> {
        let config = &self.config;
        let mut lcd = DecodedLcd::default();

        for spec in config.flags {
            if self.byte(frame, spec.byte)? & (1 << spec.bit) != 0 {
                lcd.set(spec.name);
            }
        }

        lcd.digits = self.digits(frame)?;
        if let Some(digits) = &lcd.digits
            && let Some((_, flag)) = config.mode_strings.iter().find(|(s, _)| s == digits)
        {
            lcd.set(flag);
        }

        for implication in config.implied {
            match *implication {
                Implication::Always(flag) => lcd.set(flag),
                Implication::IfMissing { flag, unless } => {
                    if !lcd.has(unless) {
                        lcd.set(flag);
                    }
                }
                Implication::IfAnyWithout { flag, any, without } => {
                    if any.iter().any(|f| lcd.has(f)) && !lcd.has(without) {
                        lcd.set(flag);
                    }
                }
            }
        }

        match config.output {
            Output::Lcd => {
                let measurement = self.lcd_measurement(&lcd)?;
                Ok(vec![DecodeOutput {
                    lcd: Some(lcd),
                    measurement,
                }])
            }
            Output::Raw(render) => {
                lcd.raw = Some(match render {
                    RawRender::Binary => frame
                        .iter()
                        .map(|b| format!("{:08b}", b))
                        .collect::<Vec<_>>()
                        .join(" "),
                    RawRender::Hex => hex_bytes(frame),
                });
                Ok(vec![DecodeOutput {
                    lcd: Some(lcd),
                    measurement: None,
                }])
            }
            Output::LuxTemperature { temperature, lux } => {
                let temperature = f64::from(self.be16(frame, temperature)?) / 10.0;
                let mut multiplier = 1u32;
                if lcd.has("x10") {
                    multiplier *= 10;
                }
                if lcd.has("x100") {
                    multiplier *= 100;
                }
                let tenths = u32::from(self.be16(frame, lux)?) * multiplier;
                // 0x0E16 at x1000 is the meter's "OL" display
                let lux = if tenths == 0x0E16 * 1000 {
                    f64::INFINITY
                } else {
                    f64::from(tenths) / 10.0
                };
                lcd.temperature = Some(temperature);
                lcd.lux = Some(lux);
                Ok(vec![
                    output(&lcd, lux, "lux"),
                    output(&lcd, temperature, "celsius"),
                ])
            }
            Output::TemperatureHumidity {
                temperature,
                humidity,
            } => {
                let temperature = f64::from(self.le16_signed(frame, temperature)?) / 10.0;
                let humidity = f64::from(self.byte(frame, humidity)?);
                lcd.temperature = Some(temperature);
                lcd.humidity = Some(humidity);
                Ok(vec![
                    output(&lcd, temperature, "celsius"),
                    output(&lcd, humidity, "%RH"),
                ])
            }
            Output::PrimaryMinor {
                mode,
                minor,
                primary,
                modes,
            } => {
                let selector = self.byte(frame, mode)?;
                let entry = modes
                    .get(usize::from(selector))
                    .ok_or_else(|| ParseError::UnknownMode {
                        model: config.model.to_string(),
                        mode: selector,
                    })?;
                let minor_value = match entry.scale {
                    MinorScale::SignedTenths => f64::from(self.le16_signed(frame, minor)?) / 10.0,
                    MinorScale::SecondByteHundredths => {
                        f64::from(self.byte(frame, minor + 1)?) / 100.0
                    }
                };
                let temperature = f64::from(self.le16_signed(frame, primary)?) / 10.0;
                lcd.minor_reading = Some(minor_value);
                lcd.minor_unit = Some(entry.unit.to_string());
                lcd.temperature = Some(temperature);
                Ok(vec![
                    output(&lcd, minor_value, entry.unit),
                    output(&lcd, temperature, "celsius"),
                ])
            }
        }
    }

    fn byte(&self, frame: &[u8], index: usize) -> ParseResult<u8> {
        frame
            .get(index)
            .copied()
            .ok_or_else(|| ParseError::OutOfRange {
                model: self.config.model.to_string(),
                index,
                len: frame.len(),
            })
    }

    fn be16(&self, frame: &[u8], index: usize) -> ParseResult<u16> {
        Ok(u16::from_be_bytes([
            self.byte(frame, index)?,
            self.byte(frame, index + 1)?,
        ]))
    }

    fn le16_signed(&self, frame: &[u8], index: usize) -> ParseResult<i16> {
        Ok(i16::from_le_bytes([
            self.byte(frame, index)?,
            self.byte(frame, index + 1)?,
        ]))
    }

    fn digits(&self, frame: &[u8]) -> ParseResult<Option<String>> {
        let model = self.config.model;
        let digits = match self.config.digits {
            DigitSource::None => return Ok(None),
            DigitSource::SegmentPairs {
                pairs,
                hi_mask,
                shift,
                lo_mask,
            } => {
                let mut digits = String::with_capacity(pairs.len());
                for (position, &(a, b)) in pairs.iter().enumerate() {
                    let pattern =
                        ((self.byte(frame, a)? & hi_mask) << shift) | (self.byte(frame, b)? & lo_mask);
                    let ch = self.config.segments.decode(pattern).ok_or_else(|| {
                        ParseError::UnknownSegment {
                            model: model.to_string(),
                            position,
                            pattern,
                        }
                    })?;
                    digits.push(ch);
                }
                digits
            }
            DigitSource::Ascii { start, end } => {
                let bytes = frame.get(start..end).ok_or(ParseError::OutOfRange {
                    model: model.to_string(),
                    index: end.saturating_sub(1),
                    len: frame.len(),
                })?;
                bytes.iter().map(|b| char::from(*b)).collect()
            }
            DigitSource::Bcd(indices) => {
                let mut digits = String::new();
                for &index in indices {
                    digits.push_str(&(self.byte(frame, index)? & 0x0F).to_string());
                }
                digits
            }
            DigitSource::BigEndian { start, end } => {
                let mut n = 0u64;
                for index in start..end {
                    n = (n << 8) | u64::from(self.byte(frame, index)?);
                }
                n.to_string()
            }
        };
        Ok(Some(digits))
    }

    /// Value of a segment-display reading: override, or scaled digits.
    fn lcd_measurement(&self, lcd: &DecodedLcd) -> ParseResult<Option<Measurement>> {
        let Some(digits) = lcd.digits.as_deref() else {
            return Ok(None);
        };
        let unit = unit_label(&lcd.flags);

        if let Some((_, literal)) = self.config.overrides.iter().find(|(s, _)| *s == digits) {
            return Ok(match literal {
                Override::Value(v) => Some(Measurement::new(*v, unit)),
                Override::Overload => Some(Measurement::new(f64::INFINITY, unit)),
                Override::Unknown => None,
            });
        }

        let mut value = parse_digits(digits).ok_or_else(|| ParseError::InvalidDigits {
            model: self.config.model.to_string(),
            digits: digits.to_string(),
        })?;
        for (flag, factor) in SCALING {
            if lcd.has(flag) {
                value *= factor;
            }
        }
        if lcd.has(config::OVERLOAD_FLAG) {
            value = f64::INFINITY;
        }
        Ok(Some(Measurement::new(value, unit)))
    }
}

fn output(lcd: &DecodedLcd, value: f64, unit: &str) -> DecodeOutput {
    DecodeOutput {
        lcd: Some(lcd.clone()),
        measurement: Some(Measurement::new(value, unit)),
    }
}

/// Parse a display digit string as a decimal number.
///
/// Surrounding blanks are allowed, as is a leading sign and one decimal
/// point. Anything else (letters, inner blanks) is rejected.
fn parse_digits(digits: &str) -> Option<f64> {
    let trimmed = digits.trim();
    let unsigned = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    let valid = !unsigned.is_empty()
        && unsigned.chars().any(|c| c.is_ascii_digit())
        && unsigned.chars().all(|c| c.is_ascii_digit() || c == '.')
        && unsigned.matches('.').count() <= 1;
    if !valid {
        return None;
    }
    trimmed.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(model: &str) -> Decoder {
        Decoder::for_model(model).unwrap()
    }

    fn single(outputs: Vec<DecodeOutput>) -> DecodeOutput {
        assert_eq!(outputs.len(), 1);
        outputs.into_iter().next().unwrap()
    }

    fn measurement(output: &DecodeOutput) -> (f64, &str) {
        let m = output.measurement.as_ref().expect("measurement");
        (m.value, m.unit.as_str())
    }

    fn display(model: &str, digits: &str, flags: &[&str]) -> Vec<u8> {
        model_config(model)
            .unwrap()
            .encode_display(digits, flags)
            .unwrap()
    }

    // --- Engine behaviour ---

    #[test]
    fn test_unknown_model() {
        let err = Decoder::for_model("XYZ").unwrap_err();
        assert!(matches!(err, Error::UnknownModel(ref m) if m == "XYZ"));
    }

    #[test]
    fn test_zero_volts() {
        let frame = display("TS04", "0000", &["volts"]);
        let out = single(decoder("TS04").decode(&frame));
        assert_eq!(measurement(&out), (0.0, "volts"));
        assert_eq!(out.lcd.unwrap().digits.as_deref(), Some("0000"));
    }

    #[test]
    fn test_scaling_composes() {
        let frame = display("TS04", "1234", &["kilo", "/100", "ohms"]);
        let out = single(decoder("TS04").decode(&frame));
        let (value, unit) = measurement(&out);
        assert!((value - 12340.0).abs() < 1e-6);
        assert_eq!(unit, "ohms");
    }

    #[test]
    fn test_negative_with_modes() {
        let frame = display("TS04", " 150", &["negative", "/10", "DC", "volts", "(hold)", "(auto)"]);
        let out = single(decoder("TS04").decode(&frame));
        let (value, unit) = measurement(&out);
        assert!((value + 15.0).abs() < 1e-9);
        assert_eq!(unit, "DC volts (auto) (hold)");
    }

    #[test]
    fn test_overload_string() {
        let frame = display("TS04", " 0L ", &["ohms", "mega"]);
        let out = single(decoder("TS04").decode(&frame));
        assert_eq!(measurement(&out), (f64::INFINITY, "ohms"));
    }

    #[test]
    fn test_blank_display_has_no_value() {
        let frame = display("TS04", "    ", &["volts"]);
        let out = single(decoder("TS04").decode(&frame));
        assert!(out.lcd.is_some());
        assert!(out.measurement.is_none());
    }

    #[test]
    fn test_wrong_length_is_absent() {
        let out = single(decoder("TS04").decode(&[0u8; 8]));
        assert!(out.is_absent());
    }

    #[test]
    fn test_ignored_chatter_is_absent() {
        let out = single(decoder("TS04").decode(b"SPP:sendData 08\\s\\n\\"));
        assert!(out.is_absent());
    }

    #[test]
    fn test_unknown_segment_is_absent() {
        let mut frame = display("TS04", "0000", &[]);
        // first digit becomes 0b0010_0000, which is not in the table
        frame[1] = (frame[1] & 0x1F) | 0x20;
        frame[2] &= 0xF0;
        let out = single(decoder("TS04").decode(&frame));
        assert!(out.is_absent());
    }

    #[test]
    fn test_an9002_whitening_and_ncv() {
        let frame = display("AN9002", "--  ", &[]);
        assert_ne!(frame, vec![0u8; 11]);
        let out = single(decoder("AN9002").decode(&frame));
        assert_eq!(measurement(&out), (2.0, "NCV"));

        let frame = display("AN9002", "Auto", &["(auto)"]);
        let out = single(decoder("AN9002").decode(&frame));
        assert!(out.measurement.is_none());
        assert!(out.lcd.unwrap().has("(auto)"));
    }

    #[test]
    fn test_an9002_milliamps() {
        let mut frame = display("AN9002", "1250", &["/100", "DC", "amps"]);
        // second "milli" position (mA range) at byte 10 bit 3, whitened
        frame[10] ^= 1 << 3;
        let out = single(decoder("AN9002").decode(&frame));
        let (value, unit) = measurement(&out);
        assert!((value - 0.0125).abs() < 1e-12);
        assert_eq!(unit, "DC amps");
    }

    #[test]
    fn test_hp90epd_reassembly_and_implied_dc() {
        let frame = display("HP90EPD", "5000", &["/1000", "volts"]);
        let decoder = decoder("HP90EPD");
        assert!(single(decoder.decode(&frame[..8])).is_absent());
        let out = single(decoder.decode(&frame[8..]));
        let (value, unit) = measurement(&out);
        assert!((value - 5.0).abs() < 1e-9);
        assert_eq!(unit, "DC volts");

        // second half without a first half is dropped
        assert!(single(decoder.decode(&frame[8..])).is_absent());

        let frame = display("HP90EPD", " 230", &["AC", "volts"]);
        decoder.decode(&frame[..8]);
        let out = single(decoder.decode(&frame[8..]));
        assert_eq!(measurement(&out), (230.0, "AC volts"));
    }

    #[test]
    fn test_hp90epd_mismatch_clears_buffer() {
        let frame = display("HP90EPD", "1111", &["ohms"]);
        let decoder = decoder("HP90EPD");
        decoder.decode(&frame[..8]);
        assert!(single(decoder.decode(&[0u8; 3])).is_absent());
        assert!(single(decoder.decode(&frame[8..])).is_absent());
    }

    #[test]
    fn test_wt81b() {
        let frame = [0xFF, 0x57, 0x4C, 0x01, 0x00, 0xEB, 0x01, 0xF4];
        let outputs = decoder("WT81B").decode(&frame);
        assert_eq!(outputs.len(), 2);
        assert_eq!(measurement(&outputs[0]), (500.0, "lux"));
        let (temp, unit) = measurement(&outputs[1]);
        assert!((temp - 23.5).abs() < 1e-9);
        assert_eq!(unit, "celsius");
    }

    #[test]
    fn test_wt81b_overload_and_limits() {
        let frame = [0xFF, 0x57, 0x4C, 0x03, 0x00, 0xEB, 0x0E, 0x16];
        let outputs = decoder("WT81B").decode(&frame);
        assert_eq!(measurement(&outputs[0]), (f64::INFINITY, "lux"));

        let frame = [0xFF, 0x57, 0x4C, 0x04, 0x00, 0xEB, 0x01, 0xF4];
        assert!(single(decoder("WT81B").decode(&frame)).is_absent());
    }

    #[test]
    fn test_tp357_negative_temperature() {
        let frame = [0xC2, 0x00, 0x00, 0xCE, 0xFF, 45, 0x2C];
        let outputs = decoder("TP357").decode(&frame);
        assert_eq!(outputs.len(), 2);
        let (temp, unit) = measurement(&outputs[0]);
        assert!((temp + 5.0).abs() < 1e-9);
        assert_eq!(unit, "celsius");
        assert_eq!(measurement(&outputs[1]), (45.0, "%RH"));
    }

    #[test]
    fn test_ut383bt_ascii() {
        let mut frame = vec![0xAA, 0xBB, 0x10, 0x01, 0x3A];
        frame.extend_from_slice(b"   123");
        frame.extend_from_slice(&[0x4C, 0x55, 0x58, 0x00, 0x30, 0x01, 0x00, 0x00]);
        let out = single(decoder("UT383BT").decode(&frame));
        assert_eq!(measurement(&out), (123.0, "lux (hold)"));

        frame[5..11].copy_from_slice(b"    OL");
        let out = single(decoder("UT383BT").decode(&frame));
        assert_eq!(measurement(&out).0, f64::INFINITY);
    }

    #[test]
    fn test_ts02_bcd() {
        let frame = [0x2D, 0x31, 0x32, 0x33, 0x34, 0x30];
        let out = single(decoder("TS02").decode(&frame));
        let (value, unit) = measurement(&out);
        assert!((value + 123.4).abs() < 1e-9);
        assert_eq!(unit, "degrees");

        let bad = [0x2D, 0x41, 0x32, 0x33, 0x34, 0x30];
        assert!(single(decoder("TS02").decode(&bad)).is_absent());
    }

    #[test]
    fn test_ts02_frame_length() {
        // a truncated frame never reaches the digit stage
        let short = [0x2D, 0x31, 0x32, 0x33, 0x34];
        assert!(single(decoder("TS02").decode(&short)).is_absent());

        // only the first six bytes carry the display
        let long = [0x29, 0x30, 0x34, 0x35, 0x30, 0x30, 0x0D, 0x0A];
        let out = single(decoder("TS02").decode(&long));
        let (value, _) = measurement(&out);
        assert!((value - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_k1705_weight_and_overload() {
        let mut frame = [
            0xA3, 0xBE, 0x15, 0x92, 0x93, 0x00, 0x00, 0xA0, 0x00, 0x00, 0x00, 0x00, 0x04, 0xD2,
            0xFF, 0x3E, 0xBA,
        ];
        let out = single(decoder("K1705").decode(&frame));
        let (value, unit) = measurement(&out);
        assert!((value - 12.34).abs() < 1e-9);
        assert_eq!(unit, "grams");

        frame[10] = 0x80;
        let out = single(decoder("K1705").decode(&frame));
        assert_eq!(measurement(&out), (f64::INFINITY, "grams"));

        assert!(single(decoder("K1705").decode(&[0u8; 128])).is_absent());
    }

    #[test]
    fn test_bt980d_raw() {
        let frame = [
            0xA7, 0x00, 0x20, 0x0B, 0x8D, 0x01, 0x00, 0xC9, 0x00, 0x00, 0x8F, 0x00, 0x00, 0xCC,
            0xBD, 0x00, 0x7A,
        ];
        let out = single(decoder("BT980D").decode(&frame));
        assert!(out.measurement.is_none());
        let lcd = out.lcd.unwrap();
        assert!(lcd.has("celsius"));
        assert!(lcd.raw.unwrap().starts_with("0xA7 0x00 0x20"));

        let ack = [
            0xA7, 0x00, 0x20, 0x07, 0x85, 0x7D, 0x43, 0x33, 0x48, 0xDE, 0x70, 0x35, 0x7A,
        ];
        assert!(single(decoder("BT980D").decode(&ack)).is_absent());
    }

    #[test]
    fn test_bt7200_fixups() {
        let frame = display("BT7200_APP", "0123", &["DC", "volts", "/100"]);
        assert_eq!(frame.len(), 15);
        let out = single(decoder("BT7200_APP").decode(&frame));
        let (value, unit) = measurement(&out);
        assert!((value - 1.23).abs() < 1e-9);
        assert_eq!(unit, "DC volts");

        // truncated block: the missing last byte is padded
        let out = single(decoder("BT7200_APP").decode(&frame[..14]));
        assert!((measurement(&out).0 - 1.23).abs() < 1e-9);

        // leading byte from the previous block is dropped
        let mut shifted = vec![0xF0];
        shifted.extend_from_slice(&frame);
        let out = single(decoder("BT7200_APP").decode(&shifted));
        assert!((measurement(&out).0 - 1.23).abs() < 1e-9);
    }

    #[test]
    fn test_bt985c_modes() {
        let frame = [0xBC, 0x00, 0xFA, 0x00, 0xEA, 0x00, 0x01, 0x00];
        let outputs = decoder("BT985C_APP").decode(&frame);
        assert_eq!(outputs.len(), 2);
        let (minor, unit) = measurement(&outputs[0]);
        assert!((minor - 25.0).abs() < 1e-9);
        assert_eq!(unit, "max_celsius");
        let (primary, unit) = measurement(&outputs[1]);
        assert!((primary - 23.4).abs() < 1e-9);
        assert_eq!(unit, "celsius");
        let lcd = outputs[1].lcd.as_ref().unwrap();
        assert!(lcd.has("celsius"));
        assert!(!lcd.has("(hold)"));

        let frame = [0xBC, 0x05, 0x00, 0x5F, 0xEA, 0x00, 0x00, 0x00];
        let outputs = decoder("BT985C_APP").decode(&frame);
        let (emissivity, unit) = measurement(&outputs[0]);
        assert!((emissivity - 0.95).abs() < 1e-9);
        assert_eq!(unit, "ε");
        assert!(outputs[1].lcd.as_ref().unwrap().has("(hold)"));

        let frame = [0xBC, 0x06, 0x00, 0x00, 0xEA, 0x00, 0x00, 0x00];
        assert!(single(decoder("BT985C_APP").decode(&frame)).is_absent());
    }

    #[test]
    fn test_dummy_binary() {
        let out = single(decoder("dummy").decode(&[0b1010_0000, 0x01]));
        assert!(out.measurement.is_none());
        let lcd = out.lcd.unwrap();
        assert!(lcd.has("dummy"));
        assert_eq!(lcd.raw.as_deref(), Some("10100000 00000001"));
    }

    #[test]
    fn test_parse_digits() {
        assert_eq!(parse_digits(" 12 "), Some(12.0));
        assert_eq!(parse_digits("-012"), Some(-12.0));
        assert_eq!(parse_digits("  1.5"), Some(1.5));
        assert_eq!(parse_digits("1 2"), None);
        assert_eq!(parse_digits("    "), None);
        assert_eq!(parse_digits("inf"), None);
        assert_eq!(parse_digits("-"), None);
    }
}
