//! Matching a card across catalogs by collector number

/// Strip leading zeros, keeping a lone `"0"` for all-zero numbers
pub fn strip_leading_zeros(number: &str) -> &str {
    let trimmed = number.trim();
    let stripped = trimmed.trim_start_matches('0');
    if stripped.is_empty() && !trimmed.is_empty() {
        "0"
    } else {
        stripped
    }
}

/// `"076"` and `"76"` name the same card; `"GG01"` and `"gg01"` too
pub fn numbers_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.eq_ignore_ascii_case(b) || strip_leading_zeros(a).eq_ignore_ascii_case(strip_leading_zeros(b))
}

/// Find the card carrying `number`.
///
/// An exact string match wins over the lenient retry (leading zeros stripped,
/// case folded), so `"01"` still prefers a `"01"` card over `"1"`.
pub fn find_by_number<'a, T>(
    cards: &'a [T],
    number: &str,
    number_of: impl Fn(&T) -> &str,
) -> Option<&'a T> {
    let number = number.trim();
    if number.is_empty() {
        return None;
    }

    cards
        .iter()
        .find(|card| number_of(card).trim() == number)
        .or_else(|| {
            cards
                .iter()
                .find(|card| numbers_match(number_of(card), number))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_zeros_are_ignored() {
        assert_eq!(strip_leading_zeros("076"), "76");
        assert_eq!(strip_leading_zeros("000"), "0");
        assert_eq!(strip_leading_zeros("GG01"), "GG01");
        assert!(numbers_match("076", "76"));
        assert!(numbers_match("tg05", "TG05"));
        assert!(!numbers_match("76", "77"));
        assert!(!numbers_match("", ""));
    }

    #[test]
    fn exact_number_beats_zero_stripped() {
        let cards = vec![("a", "1"), ("b", "01")];
        let found = find_by_number(&cards, "01", |card| card.1).unwrap();
        assert_eq!(found.0, "b");
    }

    #[test]
    fn exact_case_beats_folded_case() {
        let cards = vec![("folded", "tg05"), ("exact", "TG05")];
        let found = find_by_number(&cards, "TG05", |card| card.1).unwrap();
        assert_eq!(found.0, "exact");

        let cards = vec![("only", "tg05")];
        let found = find_by_number(&cards, "TG05", |card| card.1).unwrap();
        assert_eq!(found.0, "only");
    }

    #[test]
    fn padded_number_finds_unpadded_card() {
        let cards = vec![("pikachu", "76"), ("raichu", "77")];
        let found = find_by_number(&cards, "076", |card| card.1).unwrap();
        assert_eq!(found.0, "pikachu");
        assert!(find_by_number(&cards, "78", |card| card.1).is_none());
    }
}
