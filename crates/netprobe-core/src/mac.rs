//! MAC address normalization
//!
//! Scanners and the neighbor table report MACs with mixed casing and
//! either `:` or `-` separators. Everything stored or used as a lookup
//! key goes through [`normalize_mac`] first: uppercase hex digits with
//! no separators (`AABBCCDDEEFF`). OUI prefixes are normalized the same
//! way, so a prefix match is a plain string-prefix check.

/// Normalize a MAC address (or OUI prefix) to bare uppercase hex digits.
///
/// Returns `None` if the input contains no hex digits at all.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let hex: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if hex.is_empty() {
        None
    } else {
        Some(hex)
    }
}

/// Format a normalized MAC back to the conventional colon-separated form
pub fn format_mac(normalized: &str) -> String {
    normalized
        .as_bytes()
        .chunks(2)
        .map(|pair| std::str::from_utf8(pair).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_case() {
        assert_eq!(
            normalize_mac("aa:bb:cc:dd:ee:ff").as_deref(),
            Some("AABBCCDDEEFF")
        );
        assert_eq!(
            normalize_mac("AA-BB-CC-DD-EE-FF").as_deref(),
            Some("AABBCCDDEEFF")
        );
        assert_eq!(normalize_mac("AA-BB-CC").as_deref(), Some("AABBCC"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(normalize_mac("").is_none());
        assert!(normalize_mac("::--").is_none());
    }

    #[test]
    fn roundtrips_through_format() {
        assert_eq!(format_mac("AABBCCDDEEFF"), "AA:BB:CC:DD:EE:FF");
    }
}
