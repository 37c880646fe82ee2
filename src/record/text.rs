//! Fixed-width, NUL-padded text fields.

/// Truncate `s` so it fits a field of `capacity` bytes with room for a NUL
/// terminator, never splitting a UTF-8 character.
pub fn clamp(s: &str, capacity: usize) -> &str {
    let max = capacity.saturating_sub(1);
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Write `s` into `field`, truncating and zero-filling the remainder
pub fn write_field(field: &mut [u8], s: &str) {
    let text = clamp(s, field.len());
    field.fill(0);
    field[..text.len()].copy_from_slice(text.as_bytes());
}

/// Read a NUL-terminated string from `field`
pub fn read_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_respects_char_boundary() {
        // "é" is two bytes; a 4-byte field holds 3 bytes of text
        assert_eq!(clamp("aéé", 4), "aé");
        assert_eq!(clamp("abc", 4), "abc");
        assert_eq!(clamp("abcd", 4), "abc");
    }

    #[test]
    fn test_field_keeps_terminator() {
        let mut field = [0xFFu8; 8];
        write_field(&mut field, "overlong text");
        assert_eq!(field[7], 0);
        assert_eq!(read_field(&field), "overlon");

        write_field(&mut field, "hi");
        assert_eq!(&field[2..], &[0u8; 6]);
        assert_eq!(read_field(&field), "hi");
    }
}
