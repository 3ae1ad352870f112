//! Set name normalization used by the matching strategies

/// Era prefixes that one catalog tends to put in front of set names
const ERA_PREFIXES: &[&str] = &["ex", "xy", "sm", "swsh", "sv"];

/// Trailing words that carry no identity ("Base", "Set")
const NOISE_SUFFIXES: &[&str] = &["base", "set"];

/// Lower-case, punctuation to spaces, whitespace collapsed.
///
/// `"Scarlet & Violet—Base"` → `"scarlet violet base"`
pub fn normalize(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    spaced
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tokens of a normalized name that are long enough to be meaningful
pub fn significant_tokens(normalized: &str) -> Vec<&str> {
    normalized
        .split(' ')
        .filter(|token| token.chars().count() > 2)
        .collect()
}

/// Count of significant tokens the two names share
pub fn shared_tokens(a: &str, b: &str) -> usize {
    let b_tokens = significant_tokens(b);
    let mut a_tokens = significant_tokens(a);
    a_tokens.sort_unstable();
    a_tokens.dedup();
    a_tokens
        .into_iter()
        .filter(|token| b_tokens.contains(token))
        .count()
}

/// True when either normalized name contains the other
pub fn contains_either(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(b) || b.contains(a)
}

/// Normalized name without era prefix and noise suffixes.
///
/// A word is only dropped while at least one other word remains, so
/// `"Base Set"` still cleans to `"base"` rather than to nothing.
pub fn clean_name(name: &str) -> String {
    let normalized = normalize(name);
    let mut words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();

    if words.len() > 1 && ERA_PREFIXES.contains(&words[0]) {
        words.remove(0);
    }
    while words.len() > 1 && words.last().is_some_and(|w| NOISE_SUFFIXES.contains(w)) {
        words.pop();
    }

    words.join(" ")
}
