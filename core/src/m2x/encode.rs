//! Percent-encoding of URL path segments and query values

use ufmt::uWrite;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

/// Write `s` with everything outside the unreserved set as `%HH`, one
/// escape per UTF-8 byte
pub fn write_encoded<W: uWrite + ?Sized>(w: &mut W, s: &str) -> Result<(), W::Error> {
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if c.is_ascii() && unreserved(c as u8) {
            continue;
        }
        w.write_str(&s[start..i])?;
        let mut utf8 = [0_u8; 4];
        for &b in c.encode_utf8(&mut utf8).as_bytes() {
            w.write_char('%')?;
            w.write_char(HEX[(b >> 4) as usize] as char)?;
            w.write_char(HEX[(b & 0xF) as usize] as char)?;
        }
        start = i + c.len_utf8();
    }
    w.write_str(&s[start..])
}

/// Length of `s` after encoding
#[cfg(test)]
fn encoded_len(s: &str) -> usize {
    s.bytes().map(|b| if unreserved(b) { 1 } else { 3 }).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(s: &str) -> String {
        let mut out = String::new();
        write_encoded(&mut out, s).unwrap();
        out
    }

    #[test]
    fn unreserved_passes_through() {
        assert_eq!(encode("temperature-01_a.b~c"), "temperature-01_a.b~c");
    }

    #[test]
    fn reserved_and_non_ascii_are_escaped() {
        assert_eq!(encode("a b/c"), "a%20b%2Fc");
        assert_eq!(encode("2014-01-01T00:00:00Z"), "2014-01-01T00%3A00%3A00Z");
        assert_eq!(encode("é"), "%C3%A9");
        assert_eq!(encoded_len("é x"), 9);
    }

    #[test]
    fn multibyte_runs_keep_their_neighbours() {
        assert_eq!(encode("température"), "temp%C3%A9rature");
        assert_eq!(encode("°C/€"), "%C2%B0C%2F%E2%82%AC");
        assert_eq!(encode("température").len(), encoded_len("température"));
    }
}
