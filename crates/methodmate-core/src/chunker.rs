//! Paragraph-aligned chunking of long paper text.
//!
//! Paragraphs are separated by a blank line (`\n\s*\n`). Chunks are built
//! greedily and rejoined with [`PARAGRAPH_SEPARATOR`], so separator runs are
//! normalized but paragraph content is never altered.

use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on the characters sent to the oracle in one request.
pub const MAX_CHUNK_LENGTH: usize = 8000;

/// Separator placed between paragraphs inside a chunk.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

pub(crate) static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Length of `text` in characters, the unit every size bound is expressed in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Iterate over the paragraphs of `text` (as byte ranges), skipping empty ones.
pub(crate) fn paragraph_spans(text: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut pos = 0;
    let mut breaks = PARAGRAPH_BREAK.find_iter(text);
    let mut done = false;
    std::iter::from_fn(move || {
        while !done {
            let (start, end) = match breaks.next() {
                Some(m) => {
                    let span = (pos, m.start());
                    pos = m.end();
                    span
                }
                None => {
                    done = true;
                    (pos, text.len())
                }
            };
            if start < end {
                return Some((start, end));
            }
        }
        None
    })
}

/// Split `text` into chunks of at most `max_len` characters.
///
/// A paragraph longer than `max_len` on its own is emitted whole as an
/// oversized chunk; it is never cut. The returned iterator is lazy and can be
/// cloned to restart from the same position.
pub fn split(text: &str, max_len: usize) -> Chunks<'_> {
    Chunks {
        text,
        pos: 0,
        max_len,
        pending: None,
    }
}

/// Lazy iterator over the chunks of a text. See [`split`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of the first paragraph not yet consumed.
    pos: usize,
    max_len: usize,
    /// Paragraph that overflowed the previous chunk and opens the next one.
    pending: Option<&'a str>,
}

impl<'a> Chunks<'a> {
    fn next_paragraph(&mut self) -> Option<&'a str> {
        if let Some(p) = self.pending.take() {
            return Some(p);
        }
        while self.pos < self.text.len() {
            let rest = &self.text[self.pos..];
            let (paragraph, advance) = match PARAGRAPH_BREAK.find(rest) {
                Some(m) => (&rest[..m.start()], m.end()),
                None => (rest, rest.len()),
            };
            self.pos += advance;
            if !paragraph.is_empty() {
                return Some(paragraph);
            }
        }
        None
    }
}

impl Iterator for Chunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let first = self.next_paragraph()?;
        let mut chunk = String::from(first);
        let mut chunk_len = char_len(first);

        while let Some(paragraph) = self.next_paragraph() {
            let para_len = char_len(paragraph);
            if chunk_len + para_len + PARAGRAPH_SEPARATOR.len() <= self.max_len {
                chunk.push_str(PARAGRAPH_SEPARATOR);
                chunk.push_str(paragraph);
                chunk_len += para_len + PARAGRAPH_SEPARATOR.len();
            } else {
                self.pending = Some(paragraph);
                break;
            }
        }

        Some(chunk)
    }
}
