//! Error types for frame decoding in blemeter-types.

use thiserror::Error;

/// Errors that can occur when decoding a meter frame.
///
/// These never escape the decoder engine as failures: the engine logs them
/// and reports an absent reading instead. They exist so the individual
/// decoding steps can use `?` and so tests can assert on the exact cause.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The frame does not match the model's expected shape.
    #[error("{model}: unrecognized frame {hex}")]
    ShapeMismatch {
        /// Model whose template was applied.
        model: String,
        /// Frame bytes rendered as `0xAA 0xBB ...`.
        hex: String,
    },

    /// A digit position holds a segment pattern missing from the model's table.
    #[error("{model}: unknown segment pattern 0b{pattern:08b} at digit {position}")]
    UnknownSegment {
        /// Model whose segment table was used.
        model: String,
        /// Zero-based digit position.
        position: usize,
        /// The merged segment pattern.
        pattern: u8,
    },

    /// The assembled digit string is not a number and has no literal override.
    #[error("{model}: cannot interpret digits {digits:?}")]
    InvalidDigits {
        /// Model that produced the digits.
        model: String,
        /// The digit string.
        digits: String,
    },

    /// A mode selector byte has no known meaning.
    #[error("{model}: unknown mode byte 0x{mode:02X}")]
    UnknownMode {
        /// Model that produced the frame.
        model: String,
        /// The mode byte value.
        mode: u8,
    },

    /// A flag or field refers to a byte beyond the end of the frame.
    #[error("{model}: byte {index} out of range for {len}-byte frame")]
    OutOfRange {
        /// Model whose table was applied.
        model: String,
        /// Offending byte index.
        index: usize,
        /// Frame length.
        len: usize,
    },
}

/// Result type alias using blemeter-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Render bytes as `0xAA 0xBB` for diagnostics.
pub fn hex_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
