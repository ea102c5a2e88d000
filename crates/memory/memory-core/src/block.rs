//! Char-budget block formatting shared by every retrieval tier.

/// Separator between formatted entries.
pub const ENTRY_SEPARATOR: &str = "\n";

/// Joins entries in order until the next one would push the block past `max_chars`.
///
/// The result is always the concatenation of a prefix of `entries`. The first
/// entry that does not fit is dropped together with everything after it; no
/// entry is ever cut in the middle. Lengths are counted in chars.
pub fn format_block<S: AsRef<str>>(entries: &[S], max_chars: usize) -> String {
    let mut block = String::new();
    let mut used = 0usize;

    for entry in entries {
        let entry = entry.as_ref();
        let separator = if block.is_empty() { 0 } else { ENTRY_SEPARATOR.len() };
        let cost = separator + entry.chars().count();
        if used + cost > max_chars {
            break;
        }
        if separator > 0 {
            block.push_str(ENTRY_SEPARATOR);
        }
        block.push_str(entry);
        used += cost;
    }

    block
}

/// Number of leading entries `format_block` would emit.
pub fn fitting_prefix_len<S: AsRef<str>>(entries: &[S], max_chars: usize) -> usize {
    let mut used = 0usize;
    for (index, entry) in entries.iter().enumerate() {
        let separator = if index == 0 { 0 } else { ENTRY_SEPARATOR.len() };
        let cost = separator + entry.as_ref().chars().count();
        if used + cost > max_chars {
            return index;
        }
        used += cost;
    }
    entries.len()
}
