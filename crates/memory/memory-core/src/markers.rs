//! Anti-feedback markers.
//!
//! Retrieved context is appended to the outbound message inside a delimiter
//! pair so it can be found and stripped again before anything is written back
//! into history. Persisted turn text must never contain the pair.

/// Opens an injected context block.
pub const CONTEXT_BEGIN: &str = "<relevant-memories>";
/// Closes an injected context block.
pub const CONTEXT_END: &str = "</relevant-memories>";
/// Separator placed between the message text and the injected block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Brackets a block with the delimiter pair.
pub fn wrap_block(block: &str) -> String {
    format!("{}\n{}\n{}", CONTEXT_BEGIN, block, CONTEXT_END)
}

/// Appends a delimited block to `text`. An empty block leaves the text untouched.
pub fn inject(text: &str, block: &str) -> String {
    if block.is_empty() {
        return text.to_string();
    }
    format!("{}{}{}", text, CONTEXT_SEPARATOR, wrap_block(block))
}

/// Whether the text carries either raw marker literal.
pub fn contains_marker(text: &str) -> bool {
    text.contains(CONTEXT_BEGIN) || text.contains(CONTEXT_END)
}

/// Removes every delimited block together with its separator.
///
/// An unterminated block swallows the rest of the text. Stray marker literals
/// left over afterwards are dropped as well. For text that does not itself
/// contain a marker, `sanitize(&inject(text, block)) == text`.
pub fn sanitize(text: &str) -> String {
    if !contains_marker(text) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(CONTEXT_BEGIN) {
        let before = &rest[..start];
        let after_begin = &rest[start + CONTEXT_BEGIN.len()..];
        match after_begin.find(CONTEXT_END) {
            Some(end) => {
                let tail = &after_begin[end + CONTEXT_END.len()..];
                match before.strip_suffix(CONTEXT_SEPARATOR) {
                    Some(stripped) => {
                        out.push_str(stripped);
                        rest = tail;
                    }
                    None => {
                        out.push_str(before);
                        rest = tail.strip_prefix(CONTEXT_SEPARATOR).unwrap_or(tail);
                    }
                }
            }
            None => {
                out.push_str(before.strip_suffix(CONTEXT_SEPARATOR).unwrap_or(before));
                rest = "";
            }
        }
    }
    out.push_str(rest);

    out.replace(CONTEXT_BEGIN, "").replace(CONTEXT_END, "")
}
