//! Paragraph-boundary text chunker.
//!
//! Paragraphs (separated by a blank line) are packed into chunks of at most
//! `max_tokens`, estimated at four characters per token. A paragraph that is
//! longer than the limit on its own is cut at the last newline or space
//! before the limit.
//!
//! Chunk IDs are `"{document_id}#{index}"`, so rebuilding an index over the
//! same directory yields the same IDs. Each chunk also carries a SHA-256
//! hash of its text.

use sha2::{Digest, Sha256};

use crate::models::Chunk;

const CHARS_PER_TOKEN: usize = 4;

const PARAGRAPH_BREAK: &str = "\n\n";

/// Split `text` into chunks with contiguous indices from 0. Blank text
/// yields no chunks.
pub fn chunk_text(document_id: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    let mut packer = Packer::new(document_id, max_tokens.max(1) * CHARS_PER_TOKEN);

    for paragraph in text.split(PARAGRAPH_BREAK).map(str::trim) {
        if paragraph.is_empty() {
            continue;
        }
        if paragraph.len() > packer.limit {
            packer.flush();
            for piece in split_long(paragraph, packer.limit) {
                packer.emit(piece);
            }
        } else {
            packer.add(paragraph);
        }
    }

    packer.finish()
}

struct Packer<'a> {
    document_id: &'a str,
    limit: usize,
    pending: String,
    chunks: Vec<Chunk>,
}

impl<'a> Packer<'a> {
    fn new(document_id: &'a str, limit: usize) -> Self {
        Self {
            document_id,
            limit,
            pending: String::new(),
            chunks: Vec::new(),
        }
    }

    fn add(&mut self, paragraph: &str) {
        let joined_len = match self.pending.len() {
            0 => paragraph.len(),
            n => n + PARAGRAPH_BREAK.len() + paragraph.len(),
        };
        if joined_len > self.limit {
            self.flush();
        }
        if !self.pending.is_empty() {
            self.pending.push_str(PARAGRAPH_BREAK);
        }
        self.pending.push_str(paragraph);
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            let text = std::mem::take(&mut self.pending);
            self.emit(&text);
        }
    }

    fn emit(&mut self, text: &str) {
        let index = self.chunks.len() as i64;
        self.chunks.push(Chunk {
            id: format!("{}#{}", self.document_id, index),
            document_id: self.document_id.to_string(),
            chunk_index: index,
            text: text.to_string(),
            hash: hash_text(text),
        });
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.flush();
        self.chunks
    }
}

/// Cut an oversized paragraph into trimmed, non-empty pieces of at most
/// `limit` bytes, preferring to break after a newline or space.
fn split_long(paragraph: &str, limit: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = paragraph;

    while !rest.is_empty() {
        let hard = floor_char_boundary(rest, limit);
        let cut = if hard < rest.len() {
            rest[..hard]
                .rfind(['\n', ' '])
                .map(|pos| pos + 1)
                .unwrap_or(hard)
        } else {
            hard
        };

        let piece = rest[..cut].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        rest = &rest[cut..];
    }

    pieces
}

/// Largest char boundary `<= max`, but never 0: a single char wider than
/// `max` is taken whole.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    match (1..=max).rev().find(|&i| s.is_char_boundary(i)) {
        Some(idx) => idx,
        None => s.char_indices().nth(1).map(|(i, _)| i).unwrap_or(s.len()),
    }
}

pub fn hash_text(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("sky.txt", "The sky is blue.", 250);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "sky.txt#0");
        assert_eq!(chunks[0].document_id, "sky.txt");
        assert_eq!(chunks[0].text, "The sky is blue.");
        assert_eq!(chunks[0].hash, hash_text("The sky is blue."));
    }

    #[test]
    fn blank_text_has_no_chunks() {
        assert!(chunk_text("a", "", 250).is_empty());
        assert!(chunk_text("a", " \n\n \t", 250).is_empty());
    }

    #[test]
    fn small_paragraphs_are_packed() {
        let chunks = chunk_text("a", "One.\n\nTwo.\n\n\n\nThree.", 250);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "One.\n\nTwo.\n\nThree.");
    }

    #[test]
    fn indices_are_contiguous() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text("a", &text, 10);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.id, format!("a#{}", i));
            assert!(c.text.len() <= 40);
        }
    }

    #[test]
    fn long_paragraph_breaks_at_spaces() {
        let chunks = chunk_text("a", &"word ".repeat(100), 5);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(!c.text.is_empty());
            assert!(c.text.len() <= 20, "chunk too long: {:?}", c.text);
            assert!(!c.text.contains("wo rd"));
        }
    }

    #[test]
    fn long_paragraph_after_short_one_keeps_order() {
        let text = format!("intro\n\n{}", "x".repeat(30));
        let chunks = chunk_text("a", &text, 2);
        assert_eq!(chunks[0].text, "intro");
        let rest: String = chunks[1..].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rest, "x".repeat(30));
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "é".repeat(31);
        let chunks = chunk_text("a", &text, 1);
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn same_input_same_chunks() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        assert_eq!(chunk_text("a", text, 2), chunk_text("a", text, 2));
    }
}
