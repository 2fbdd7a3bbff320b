//! Context truncation.
//!
//! Joins retrieved fragments into one block and hard-caps its length in
//! characters. The cut ignores word and fragment boundaries but never splits
//! a code point.

use ragbridge_core::retrieval::ContextFragment;

/// Separator placed between consecutive fragment texts.
pub const FRAGMENT_SEPARATOR: &str = "\n\n";

/// Concatenate fragment texts in the order received, then keep at most
/// `max_chars` characters.
pub fn truncate_context(fragments: &[ContextFragment], max_chars: usize) -> String {
    if fragments.is_empty() || max_chars == 0 {
        return String::new();
    }

    let joined = fragments
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR);

    cut_chars(joined, max_chars)
}

fn cut_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_idx);
    }
    text
}
