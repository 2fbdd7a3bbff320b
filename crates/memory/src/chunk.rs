//! Paragraph-boundary text chunker.
//!
//! Splits extracted document text into pieces of at most `max_chars`
//! characters. Splits happen on blank lines first, then on the last newline
//! or space inside an oversized paragraph, and only as a last resort in the
//! middle of a word. Never splits a code point.

/// Split `text` into chunks of at most `max_chars` characters.
///
/// Whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        let para_chars = trimmed.chars().count();

        // +2 for the \n\n separator
        let would_be = if current.is_empty() {
            para_chars
        } else {
            current_chars + 2 + para_chars
        };

        if would_be > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        if para_chars > max_chars {
            split_long(trimmed, max_chars, &mut chunks);
            continue;
        }

        if !current.is_empty() {
            current.push_str("\n\n");
            current_chars += 2;
        }
        current.push_str(trimmed);
        current_chars += para_chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Hard-split one oversized paragraph, preferring newline then space breaks.
fn split_long(paragraph: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = paragraph;

    while !remaining.is_empty() {
        let limit = byte_offset_of_char(remaining, max_chars);
        if limit >= remaining.len() {
            let piece = remaining.trim();
            if !piece.is_empty() {
                out.push(piece.to_string());
            }
            break;
        }

        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&pos| pos > 0)
            .map(|pos| pos + 1)
            .unwrap_or(limit);

        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }
}

/// Byte offset of the `n`th character, or the string length if shorter.
fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
