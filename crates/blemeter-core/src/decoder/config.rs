//! Per-model decoding configuration.
//!
//! A [`ModelConfig`] is plain data: where the flags live, how digits are
//! laid out, what the frame must look like and which quirks apply. The
//! engine in [`super::Decoder`] interprets it.

use blemeter_types::MessageSpec;
use uuid::Uuid;

use super::pattern::FramePattern;
use super::segments::SegmentTable;

/// A named boolean condition at a fixed bit of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagSpec {
    /// Flag name. Display modes use the label vocabulary, e.g. `"(hold)"`.
    pub name: &'static str,
    /// Byte index within the (reassembled, unwhitened) frame.
    pub byte: usize,
    /// Bit index, 0 = least significant.
    pub bit: u8,
}

/// Shorthand for building flag tables.
pub const fn flag(name: &'static str, byte: usize, bit: u8) -> FlagSpec {
    FlagSpec { name, byte, bit }
}

/// Multiplicative factor of every scaling flag, applied cumulatively.
pub const SCALING: &[(&str, f64)] = &[
    ("negative", -1.0),
    ("positive", 1.0),
    ("/1000", 0.001),
    ("/100", 0.01),
    ("/10", 0.1),
    ("kilo", 1e3),
    ("mega", 1e6),
    ("milli", 1e-3),
    ("micro", 1e-6),
    ("nano", 1e-9),
    ("x10", 10.0),
    ("x100", 100.0),
];

/// Flag that turns any numeric reading into positive infinity.
pub const OVERLOAD_FLAG: &str = "(overload)";

/// What a literal digit string stands for instead of its parsed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Override {
    /// A fixed value, reported unscaled (NCV bar graphs, error codes).
    Value(f64),
    /// Out of range, reported as positive infinity.
    Overload,
    /// No usable number: the reading keeps its display state but has no value.
    Unknown,
}

/// A flag that is set by model knowledge rather than by a frame bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Implication {
    /// Always set.
    Always(&'static str),
    /// Set unless `unless` is present.
    IfMissing {
        flag: &'static str,
        unless: &'static str,
    },
    /// Set when any of `any` is present and `without` is not.
    IfAnyWithout {
        flag: &'static str,
        any: &'static [&'static str],
        without: &'static str,
    },
}

/// Where the display digits come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigitSource {
    /// The model has no digit string.
    None,
    /// Seven-segment digits split across adjacent bytes.
    ///
    /// Each pair `(a, b)` yields the pattern
    /// `((frame[a] & hi_mask) << shift) | (frame[b] & lo_mask)`.
    SegmentPairs {
        pairs: &'static [(usize, usize)],
        hi_mask: u8,
        shift: u8,
        lo_mask: u8,
    },
    /// ASCII characters in `start..end`.
    Ascii { start: usize, end: usize },
    /// One decimal digit in the low nibble of each listed byte.
    Bcd(&'static [usize]),
    /// Big-endian unsigned integer in `start..end`, rendered in decimal.
    BigEndian { start: usize, end: usize },
}

/// How a secondary reading is encoded for one mode byte value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinorScale {
    /// Signed little-endian 16-bit tenths.
    SignedTenths,
    /// Second byte of the field on its own, in hundredths.
    SecondByteHundredths,
}

/// One entry of a mode-selected secondary reading table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinorMode {
    /// Unit label reported with the secondary value.
    pub unit: &'static str,
    /// Encoding of the secondary value.
    pub scale: MinorScale,
}

/// Rendering of flags-only frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawRender {
    /// `01011010 ...`
    Binary,
    /// `0xA7 0x00 ...`
    Hex,
}

/// What a decoded frame turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// One reading from the digit string and flags.
    Lcd,
    /// Flags and a rendering of the frame, no value.
    Raw(RawRender),
    /// Illuminance and temperature as big-endian tenths.
    LuxTemperature { temperature: usize, lux: usize },
    /// Signed little-endian temperature tenths and a humidity byte.
    TemperatureHumidity { temperature: usize, humidity: usize },
    /// A primary temperature plus a secondary reading chosen by a mode byte.
    PrimaryMinor {
        mode: usize,
        minor: usize,
        primary: usize,
        modes: &'static [MinorMode],
    },
}

/// Frame rewrite applied before the shape check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fixup {
    /// Append a byte to frames matching `when`.
    Append { when: FramePattern, byte: u8 },
    /// Drop the first byte of frames matching `when`.
    DropFirst { when: FramePattern },
}

/// Multi-packet framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reassembly {
    /// Every notification is a whole frame.
    #[default]
    None,
    /// A `first`-byte packet is buffered and joined with the next `second`-byte packet.
    TwoPart { first: usize, second: usize },
}

/// Everything needed to decode one meter model and talk to it.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Canonical model name.
    pub model: &'static str,
    /// Characteristic that carries display frames.
    pub notify: Uuid,
    /// Written once after subscribing.
    pub init: Option<MessageSpec>,
    /// Written periodically while active.
    pub poll: Option<MessageSpec>,
    /// Written before a graceful disconnect.
    pub stop: Option<MessageSpec>,
    /// Required frame shape.
    pub pattern: FramePattern,
    /// Upper bounds on single bytes, checked with the shape.
    pub limits: &'static [(usize, u8)],
    /// Vendor chatter that is dropped silently.
    pub ignore: Vec<FramePattern>,
    /// Resynchronisation rewrites.
    pub fixups: Vec<Fixup>,
    /// Per-byte XOR key applied after the shape check.
    pub whitening: &'static [u8],
    /// Packet joining.
    pub reassembly: Reassembly,
    /// Flag bit table.
    pub flags: &'static [FlagSpec],
    /// Seven-segment table.
    pub segments: SegmentTable,
    /// Digit layout.
    pub digits: DigitSource,
    /// Literal digit strings with special meaning.
    pub overrides: &'static [(&'static str, Override)],
    /// Digit strings that imply a flag, e.g. NCV bar graphs.
    pub mode_strings: &'static [(&'static str, &'static str)],
    /// Flags set by model knowledge.
    pub implied: &'static [Implication],
    /// Reading construction.
    pub output: Output,
}

impl ModelConfig {
    /// A configuration that accepts any frame and decodes nothing.
    pub fn new(model: &'static str, notify: Uuid) -> Self {
        Self {
            model,
            notify,
            init: None,
            poll: None,
            stop: None,
            pattern: FramePattern::Any,
            limits: &[],
            ignore: Vec::new(),
            fixups: Vec::new(),
            whitening: &[],
            reassembly: Reassembly::None,
            flags: &[],
            segments: SegmentTable::default(),
            digits: DigitSource::None,
            overrides: &[],
            mode_strings: &[],
            implied: &[],
            output: Output::Lcd,
        }
    }

    /// Render a display state into a frame, the inverse of decoding.
    ///
    /// Only models with a fixed-size segment display support this. Returns
    /// `None` if a character is missing from the segment table or a flag is
    /// not part of the model's flag table.
    pub fn encode_display(&self, digits: &str, flags: &[&str]) -> Option<Vec<u8>> {
        let DigitSource::SegmentPairs {
            pairs,
            hi_mask,
            shift,
            lo_mask,
        } = self.digits
        else {
            return None;
        };
        let mut frame = self.pattern.template_frame()?;

        let chars: Vec<char> = digits.chars().collect();
        if chars.len() != pairs.len() {
            return None;
        }
        for (&(a, b), ch) in pairs.iter().zip(chars) {
            let pattern = self.segments.encode(ch)?;
            *frame.get_mut(a)? |= (pattern >> shift) & hi_mask;
            *frame.get_mut(b)? |= pattern & lo_mask;
        }
        for name in flags {
            let spec = self.flags.iter().find(|f| f.name == *name)?;
            *frame.get_mut(spec.byte)? |= 1 << spec.bit;
        }
        for (byte, key) in frame.iter_mut().zip(self.whitening) {
            *byte ^= key;
        }
        Some(frame)
    }
}
