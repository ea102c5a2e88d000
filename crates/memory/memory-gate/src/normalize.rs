//! Text normalization applied to messages and patterns before matching.

/// Lowercases, folds quote variants, turns every char that is not a Unicode
/// letter, number or apostrophe into a space, and collapses whitespace.
pub fn normalize(text: &str) -> String {
    let mut mapped = String::with_capacity(text.len());
    for ch in text.chars().flat_map(char::to_lowercase) {
        let ch = match ch {
            '\u{2018}' | '\u{2019}' | '\u{201B}' | '\u{00B4}' | '\u{FF40}' | '\u{FF07}' | '`' => {
                '\''
            }
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{FF02}' => '"',
            other => other,
        };
        if ch.is_alphanumeric() || ch == '\'' {
            mapped.push(ch);
        } else {
            mapped.push(' ');
        }
    }
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether a normalized pattern occurs in normalized text.
///
/// ASCII patterns must sit on word boundaries; anything else (CJK) is a
/// plain substring match since those scripts are not space-delimited.
pub fn contains_term(normalized_text: &str, normalized_pattern: &str) -> bool {
    if normalized_pattern.is_empty() {
        return false;
    }
    if normalized_pattern.is_ascii() {
        let haystack = format!(" {} ", normalized_text);
        let needle = format!(" {} ", normalized_pattern);
        haystack.contains(&needle)
    } else {
        normalized_text.contains(normalized_pattern)
    }
}
