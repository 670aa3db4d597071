//! Client-side guard on prompt length.

/// Number of characters (not bytes) in `input`.
pub fn char_count(input: &str) -> usize {
    input.chars().count()
}

/// Cut `input` down to `max` characters.
///
/// Returns the kept text and whether anything was removed.
pub fn limit_characters(input: &str, max: usize) -> (&str, bool) {
    match input.char_indices().nth(max) {
        Some((byte_idx, _)) => (&input[..byte_idx], true),
        None => (input, false),
    }
}
