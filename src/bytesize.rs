//! Byte-size strings such as `32768`, `64k` or `1MiB`.

/// Parse a byte count with an optional binary unit suffix.
///
/// Units are powers of 1024 and case-insensitive. Returns `None` for anything
/// that is not a non-negative integer with a known suffix, or that overflows.
pub(crate) fn parse_byte_size(value: &str) -> Option<u64> {
    let value = value.trim();
    let split = value
        .find(|ch: char| !ch.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, suffix) = value.split_at(split);
    if digits.is_empty() {
        return None;
    }
    let number: u64 = digits.parse().ok()?;
    let multiplier: u64 = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        _ => return None,
    };
    number.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_suffixed_sizes() {
        assert_eq!(parse_byte_size("32768"), Some(32768));
        assert_eq!(parse_byte_size(" 64k "), Some(65536));
        assert_eq!(parse_byte_size("1MiB"), Some(1 << 20));
        assert_eq!(parse_byte_size("2 GB"), Some(2 << 30));
        assert_eq!(parse_byte_size("0"), Some(0));
    }

    #[test]
    fn rejects_malformed_sizes() {
        assert_eq!(parse_byte_size(""), None);
        assert_eq!(parse_byte_size("-1"), None);
        assert_eq!(parse_byte_size("abc"), None);
        assert_eq!(parse_byte_size("12t"), None);
        assert_eq!(parse_byte_size("18446744073709551615k"), None);
        assert_eq!(parse_byte_size("99999999999999999999999"), None);
    }
}
