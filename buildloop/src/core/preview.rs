//! Display-only truncation of reasoning-service text.

/// Truncate `text` to at most `max_chars` characters, appending `...` when cut.
///
/// Counts `char`s, not bytes, so multi-byte text never splits mid-character.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
