//! Token estimation.
//!
//! Word-based heuristic: a word costs `tokens_per_word` tokens (1.3 by
//! default), rounded up over the whole text.

/// Multiplier used when none is configured.
pub const DEFAULT_TOKENS_PER_WORD: f64 = 1.3;

/// Estimate the token count of `text` as `ceil(words × tokens_per_word)`.
pub fn estimate_tokens(text: &str, tokens_per_word: f64) -> usize {
    let words = text.split_whitespace().count();
    if words == 0 {
        return 0;
    }
    // Snap away float noise so 10 × 1.3 is 13, not 14.
    let raw = words as f64 * tokens_per_word;
    let snapped = (raw * 1e9).round() / 1e9;
    snapped.ceil() as usize
}
