use std::fmt;

pub fn hex_encode<B: AsRef<[u8]>>(data: B, upper: bool) -> String {
    data.as_ref()
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0b0000_1111])
        .map(|nibble| {
            if nibble < 10 {
                b'0' + nibble
            } else if upper {
                b'A' + nibble - 10
            } else {
                b'a' + nibble - 10
            }
        })
        .map(char::from)
        .collect()
}

/// Lazily hex-formats bytes for log fields. Empty input shows as `-`.
pub(crate) struct Hex<'a>(pub(crate) &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("-")
        } else {
            f.write_str(&hex_encode(self.0, false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode(b"\x00\x1f\xab", false), "001fab");
        assert_eq!(hex_encode(b"\x00\x1f\xab", true), "001FAB");
    }

    #[test]
    fn test_hex_display() {
        assert_eq!(Hex(b"").to_string(), "-");
        assert_eq!(Hex(b"\x01\x02").to_string(), "0102");
    }
}
