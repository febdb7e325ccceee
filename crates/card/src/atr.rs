//! ATR-based card matching.

/// Match an answer-to-reset against a table of hex patterns.
///
/// Patterns may separate bytes with `:`. Entries that do not decode as hex
/// are skipped. A pattern matches only when its decoded length equals the
/// ATR length and the bytes compare equal; the first match wins. Probing is
/// pure and never touches the card.
pub fn match_atr(atr: &[u8], patterns: &[&str]) -> Option<usize> {
    patterns
        .iter()
        .position(|pattern| decode_pattern(pattern).is_some_and(|bytes| bytes == atr))
}

fn decode_pattern(pattern: &str) -> Option<Vec<u8>> {
    let compact: String = pattern.chars().filter(|c| *c != ':').collect();
    hex::decode(compact).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[&str] = &[
        "3B:95:94:40:FF:63:01:01:02:01",
        "3B:19:14:55:90:01:02:02:00:05:04:B0",
    ];

    #[test]
    fn test_second_entry_matches() {
        let atr = hex::decode("3B19145590010202000504B0").unwrap();
        assert_eq!(match_atr(&atr, TABLE), Some(1));
    }

    #[test]
    fn test_length_mismatch_is_no_match() {
        // Prefix of the first entry, shorter than any table entry
        let atr = hex::decode("3B9594").unwrap();
        assert_eq!(match_atr(&atr, TABLE), None);
    }

    #[test]
    fn test_malformed_pattern_is_skipped() {
        let table = &["not hex at all", "3B:00"];
        assert_eq!(match_atr(&[0x3B, 0x00], table), Some(1));
    }
}
