//! Splits long source text into bounded passages for embedding.
//!
//! Each passage holds at most `max_chars` characters. Inside a window the
//! split point is, in order of preference: a blank-line paragraph break in
//! the second half of the window, the last sentence end, the last
//! whitespace, and finally a hard cut on a character boundary.

use crate::types::{Passage, PassageId, SourceDocument};

#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    max_chars: usize,
}

impl Default for TextChunker {
    fn default() -> Self { Self { max_chars: 800 } }
}

impl TextChunker {
    pub fn new(max_chars: usize) -> Self { Self { max_chars: max_chars.max(1) } }

    pub fn max_chars(&self) -> usize { self.max_chars }

    /// Lazily yields trimmed, non-empty slices of `text`.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> { Chunks { rest: text, max_chars: self.max_chars } }

    /// Expands documents into passages with sequential ids starting at `first_id`.
    pub fn passages(&self, documents: &[SourceDocument], first_id: PassageId) -> Vec<Passage> {
        let mut next_id = first_id;
        let mut out = Vec::new();
        for doc in documents {
            for (chunk_index, text) in self.chunks(&doc.text).enumerate() {
                out.push(Passage { id: next_id, text: text.to_string(), source_id: doc.source_id.clone(), chunk_index });
                next_id += 1;
            }
        }
        out
    }
}

pub struct Chunks<'a> {
    rest: &'a str,
    max_chars: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let rest = self.rest.trim_start();
            if rest.is_empty() {
                self.rest = rest;
                return None;
            }
            let cut = match rest.char_indices().nth(self.max_chars) {
                None => rest.len(),
                Some((window_end, _)) => find_break(rest, window_end),
            };
            let (head, tail) = rest.split_at(cut);
            self.rest = tail;
            let chunk = head.trim_end();
            if !chunk.is_empty() {
                return Some(chunk);
            }
        }
    }
}

/// `rest` starts with a non-whitespace char; `window_end` is a char boundary.
/// Always returns a char boundary in `1..=window_end`.
fn find_break(rest: &str, window_end: usize) -> usize {
    let window = &rest[..window_end];

    if let Some(pos) = window.rfind("\n\n") {
        if pos > 0 && pos >= window_end / 2 {
            return pos;
        }
    }

    let mut sentence_end = None;
    let mut last_space = None;
    let mut chars = window.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let after = i + c.len_utf8();
        if c == '\n' && i > 0 {
            sentence_end = Some(after);
        } else if matches!(c, '.' | '?' | '!') {
            let next = chars.peek().map(|&(_, n)| n).or_else(|| rest[after..].chars().next());
            if next.map_or(false, char::is_whitespace) {
                sentence_end = Some(after);
            }
        }
        if c.is_whitespace() && i > 0 {
            last_space = Some(i);
        }
    }

    sentence_end.or(last_space).unwrap_or(window_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = TextChunker::new(100);
        let chunks: Vec<_> = chunker.chunks("  The gym opens at 6am.  ").collect();
        assert_eq!(chunks, vec!["The gym opens at 6am."]);
    }

    #[test]
    fn prefers_sentence_end_nearest_the_bound() {
        let chunker = TextChunker::new(45);
        let text = "Labs close at 9pm. Printing costs 5 cents. Scanners are free.";
        let chunks: Vec<_> = chunker.chunks(text).collect();
        assert_eq!(chunks[0], "Labs close at 9pm. Printing costs 5 cents.");
        assert_eq!(chunks[1], "Scanners are free.");
    }

    #[test]
    fn prefers_paragraph_break_in_second_half() {
        let chunker = TextChunker::new(50);
        let text = "Exam rules. No phones allowed in hall.\n\nBring your student ID card.";
        let chunks: Vec<_> = chunker.chunks(text).collect();
        assert_eq!(chunks[0], "Exam rules. No phones allowed in hall.");
        assert_eq!(chunks[1], "Bring your student ID card.");
    }

    #[test]
    fn falls_back_to_whitespace_then_hard_cut() {
        let chunker = TextChunker::new(10);
        let chunks: Vec<_> = chunker.chunks("alpha bravo charlie").collect();
        assert_eq!(chunks, vec!["alpha", "bravo", "charlie"]);

        let chunks: Vec<_> = chunker.chunks("abcdefghijklmnopqrstuvwxy").collect();
        assert_eq!(chunks, vec!["abcdefghij", "klmnopqrst", "uvwxy"]);
    }

    #[test]
    fn never_splits_multibyte_characters() {
        let chunker = TextChunker::new(3);
        let text = "çàéüöñ日本語";
        let chunks: Vec<_> = chunker.chunks(text).collect();
        assert_eq!(chunks, vec!["çàé", "üöñ", "日本語"]);
    }

    #[test]
    fn empty_and_blank_input_yield_nothing() {
        let chunker = TextChunker::new(10);
        assert_eq!(chunker.chunks("").count(), 0);
        assert_eq!(chunker.chunks(" \n\t\n ").count(), 0);
    }
}
