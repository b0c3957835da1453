//! Frame shape templates.

/// The shape a frame must have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePattern {
    /// Any frame.
    Any,
    /// Exactly this many bytes.
    Length(usize),
    /// Exactly these bytes.
    Exact(&'static [u8]),
    /// Nibble template such as `"BC 0. .. .."`.
    ///
    /// Spaces are ignored; each remaining character is a hex nibble that
    /// must match or `.` for any nibble. The frame must have exactly half
    /// as many bytes as the template has nibbles.
    Nibbles(&'static str),
    /// `frame[index] & mask == expected` for every rule.
    Masked(&'static [(usize, u8, u8)]),
}

impl FramePattern {
    /// Check a frame against the pattern.
    pub fn matches(&self, frame: &[u8]) -> bool {
        match self {
            FramePattern::Any => true,
            FramePattern::Length(len) => frame.len() == *len,
            FramePattern::Exact(bytes) => frame == *bytes,
            FramePattern::Nibbles(template) => match_nibbles(template, frame),
            FramePattern::Masked(rules) => rules.iter().all(|&(index, mask, expected)| {
                frame.get(index).is_some_and(|b| b & mask == expected)
            }),
        }
    }

    /// A zeroed frame of the pattern's size with every fixed nibble filled in.
    ///
    /// Returns `None` for patterns without a fixed size.
    pub fn template_frame(&self) -> Option<Vec<u8>> {
        match self {
            FramePattern::Length(len) => Some(vec![0; *len]),
            FramePattern::Exact(bytes) => Some(bytes.to_vec()),
            FramePattern::Nibbles(template) => {
                let nibbles: Vec<char> = template.chars().filter(|c| *c != ' ').collect();
                if nibbles.len() % 2 != 0 {
                    return None;
                }
                Some(
                    nibbles
                        .chunks(2)
                        .map(|pair| {
                            let hi = pair[0].to_digit(16).unwrap_or(0) as u8;
                            let lo = pair[1].to_digit(16).unwrap_or(0) as u8;
                            (hi << 4) | lo
                        })
                        .collect(),
                )
            }
            FramePattern::Any | FramePattern::Masked(_) => None,
        }
    }
}

fn match_nibbles(template: &str, frame: &[u8]) -> bool {
    let nibbles: Vec<char> = template.chars().filter(|c| *c != ' ').collect();
    if nibbles.len() != frame.len() * 2 {
        return false;
    }
    frame.iter().enumerate().all(|(i, byte)| {
        nibble_matches(nibbles[i * 2], byte >> 4) && nibble_matches(nibbles[i * 2 + 1], byte & 0x0F)
    })
}

fn nibble_matches(pattern: char, nibble: u8) -> bool {
    pattern == '.' || pattern.to_digit(16) == Some(u32::from(nibble))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_and_any() {
        assert!(FramePattern::Any.matches(&[]));
        assert!(FramePattern::Length(3).matches(&[1, 2, 3]));
        assert!(!FramePattern::Length(3).matches(&[1, 2]));
    }

    #[test]
    fn test_byte_wildcards() {
        let p = FramePattern::Nibbles("FF 57 4C .. .. .. .. ..");
        assert!(p.matches(&[0xFF, 0x57, 0x4C, 1, 2, 3, 4, 5]));
        assert!(!p.matches(&[0xFF, 0x57, 0x4D, 1, 2, 3, 4, 5]));
        assert!(!p.matches(&[0xFF, 0x57, 0x4C, 1, 2, 3, 4]));
    }

    #[test]
    fn test_nibble_wildcards() {
        let p = FramePattern::Nibbles("BC 0. ..");
        assert!(p.matches(&[0xBC, 0x05, 0x99]));
        assert!(!p.matches(&[0xBC, 0x15, 0x99]));
        // lowercase hex is accepted in templates
        assert!(FramePattern::Nibbles("bc").matches(&[0xBC]));
    }

    #[test]
    fn test_masked() {
        let p = FramePattern::Masked(&[(0, 0b1111_1001, 0b0010_1001), (1, 0xF0, 0x30)]);
        assert!(p.matches(&[0x2D, 0x37]));
        assert!(!p.matches(&[0x2D, 0x47]));
        assert!(!p.matches(&[0x2D]));
    }

    #[test]
    fn test_exact() {
        let p = FramePattern::Exact(b"SPP:sendData 08\\s\\n\\");
        assert!(p.matches(b"SPP:sendData 08\\s\\n\\"));
        assert!(!p.matches(b"SPP:sendData 08"));
    }

    #[test]
    fn test_template_frame() {
        let p = FramePattern::Nibbles("1.2.F.");
        assert_eq!(p.template_frame(), Some(vec![0x10, 0x20, 0xF0]));
        assert_eq!(FramePattern::Length(2).template_frame(), Some(vec![0, 0]));
        assert_eq!(FramePattern::Any.template_frame(), None);
    }
}
