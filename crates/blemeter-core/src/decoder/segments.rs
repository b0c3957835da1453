//! Seven-segment lookup tables.

/// Segment patterns shared by the TS04 family (TS04, AN9002, V05B, BT7200).
pub const TS04_SEGMENTS: &[(u8, char)] = &[
    (0b0000_0000, ' '),
    (0b1110_1011, '0'),
    (0b0000_1010, '1'),
    (0b1010_1101, '2'),
    (0b1000_1111, '3'),
    (0b0100_1110, '4'),
    (0b1100_0111, '5'),
    (0b1110_0111, '6'),
    (0b1000_1010, '7'),
    (0b1110_1111, '8'),
    (0b1100_1111, '9'),
    (0b0110_0001, 'L'),
    (0b1110_0101, 'E'),
    (0b1110_0100, 'F'),
    (0b0000_0100, '-'),
];

/// Letters the AN9002 shows while auto-ranging ("Auto").
pub const AN9002_LETTERS: &[(u8, char)] = &[
    (0b1110_1110, 'A'),
    (0b0010_0011, 'u'),
    (0b0110_0101, 't'),
    (0b0010_0111, 'o'),
];

/// HP90EPD patterns (7 bits).
pub const HP90EPD_SEGMENTS: &[(u8, char)] = &[
    (0b000_0000, ' '),
    (0b111_1101, '0'),
    (0b000_0101, '1'),
    (0b101_1011, '2'),
    (0b001_1111, '3'),
    (0b010_0111, '4'),
    (0b011_1110, '5'),
    (0b111_1110, '6'),
    (0b001_0101, '7'),
    (0b111_1111, '8'),
    (0b011_1111, '9'),
    (0b110_1000, 'L'),
];

/// Bidirectional map between segment patterns and characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentTable {
    entries: Vec<(u8, char)>,
}

impl SegmentTable {
    /// Build a table from one or more pattern lists; later lists win.
    pub fn new(layers: &[&[(u8, char)]]) -> Self {
        let mut table = Self::default();
        for layer in layers {
            for &(pattern, ch) in *layer {
                table.entries.retain(|(p, _)| *p != pattern);
                table.entries.push((pattern, ch));
            }
        }
        table
    }

    /// Character shown by a pattern.
    pub fn decode(&self, pattern: u8) -> Option<char> {
        self.entries
            .iter()
            .find(|(p, _)| *p == pattern)
            .map(|(_, c)| *c)
    }

    /// Pattern that shows a character.
    pub fn encode(&self, ch: char) -> Option<u8> {
        self.entries.iter().find(|(_, c)| *c == ch).map(|(p, _)| *p)
    }

    /// Every character in the table.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.entries.iter().map(|(_, c)| *c)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
