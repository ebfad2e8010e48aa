//! Text normalisation and token-budgeted splitting.
//!
//! Splitting is word-aligned: windows are built from whole words so that
//! joining a window back together never cuts a multi-byte character, and the
//! token budget is measured with the same cl100k encoder used for memory.

use crate::tokens::count_tokens;

/// Collapse whitespace runs to single spaces and drop characters other than
/// word characters, whitespace and `. , ! ? ; : - ( ) [ ] " '`.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if !is_kept(c) {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    out
}

fn is_kept(c: char) -> bool {
    c.is_alphanumeric()
        || c == '_'
        || matches!(
            c,
            '.' | ',' | '!' | '?' | ';' | ':' | '-' | '(' | ')' | '[' | ']' | '"' | '\''
        )
}

/// Split `text` into windows of at most `chunk_size` tokens, each repeating
/// at least `overlap` tokens from the end of the previous window.
///
/// A single word larger than `chunk_size` becomes its own window. Requires
/// `overlap < chunk_size`.
pub fn split_by_tokens(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    split_by_tokens_with(text, chunk_size, overlap, count_tokens)
}

/// [`split_by_tokens`] with a caller-supplied per-word token counter.
pub fn split_by_tokens_with<F>(text: &str, chunk_size: usize, overlap: usize, count: F) -> Vec<String>
where
    F: Fn(&str) -> usize,
{
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    // A word's cost includes its leading space, the way BPE sees running text
    let costs: Vec<usize> = words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if i == 0 {
                count(w)
            } else {
                count(&format!(" {w}"))
            }
        })
        .collect();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let mut end = start;
        let mut used = 0usize;
        while end < words.len() && (end == start || used + costs[end] <= chunk_size) {
            used += costs[end];
            end += 1;
        }

        chunks.push(words[start..end].join(" "));
        if end >= words.len() {
            break;
        }

        // Back up from `end` until at least `overlap` tokens are repeated,
        // always moving forward by at least one word
        let mut next = end;
        let mut repeated = 0usize;
        while next > start + 1 && repeated < overlap {
            next -= 1;
            repeated += costs[next];
        }
        start = next;
    }

    chunks
}
