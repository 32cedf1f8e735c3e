//! Character-based truncation for tool output.

/// Split `text` after `max_chars` characters.
///
/// Returns the kept prefix and whether anything was dropped. Counts Unicode
/// scalar values, never splitting inside a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// Marker appended to a file read that hit the character limit.
pub fn file_truncation_marker(path: &str, max_chars: usize) -> String {
    format!("[...File \"{path}\" truncated at {max_chars} characters]")
}
