//! Splits document text into bounded, optionally overlapping chunks for embedding.
//!
//! Lengths are counted in characters. The boundary policy prefers paragraph breaks,
//! then line breaks, then spaces, and only then cuts mid-word. The fixed policy cuts
//! plain windows so consecutive chunks share exactly `chunk_overlap` characters.

use std::collections::VecDeque;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::documents::Document;

/// Default maximum characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    /// Prefer paragraph, line, then word boundaries; hard cuts as a last resort.
    #[default]
    Boundaries,
    /// Plain character windows stepping by `chunk_size - chunk_overlap`.
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks. Must be smaller than `chunk_size`.
    pub chunk_overlap: usize,
    pub policy: SplitPolicy,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: 0,
            policy: SplitPolicy::Boundaries,
        }
    }
}

impl ChunkConfig {
    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.chunk_size == 0 {
            return Err(ChunkError::ZeroSize);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkError::OverlapTooLarge {
                overlap: self.chunk_overlap,
                size: self.chunk_size,
            });
        }
        Ok(())
    }
}

/// A chunk of text from a document, with source reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: PathBuf,
    /// Index of this chunk within its document (0, 1, 2, …).
    pub index: usize,
}

/// Chunk a single document.
pub fn chunk_document(document: &Document, config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkError> {
    config.validate()?;
    let pieces = match config.policy {
        SplitPolicy::Boundaries => split_on_boundaries(&document.text, config),
        SplitPolicy::Fixed => split_fixed(&document.text, config),
    };
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            text,
            source: document.source.clone(),
            index,
        })
        .collect())
}

/// Chunk all documents. Returns chunks from all documents in order.
pub fn chunk_documents(documents: &[Document], config: &ChunkConfig) -> Result<Vec<Chunk>, ChunkError> {
    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(chunk_document(document, config)?);
    }
    tracing::info!(
        "split {} document(s) into {} chunk(s)",
        documents.len(),
        chunks.len()
    );
    Ok(chunks)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Windows of `chunk_size` characters starting every `chunk_size - chunk_overlap` characters.
fn split_fixed(text: &str, config: &ChunkConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let step = config.chunk_size - config.chunk_overlap;
    let mut result = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(chars.len());
        result.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    result
}

/// Break text into pieces no longer than `chunk_size`, then greedily merge neighbours
/// back up to `chunk_size`, carrying up to `chunk_overlap` characters of whole pieces
/// into the next chunk.
fn split_on_boundaries(text: &str, config: &ChunkConfig) -> Vec<String> {
    let mut pieces = Vec::new();
    split_pieces(text, config.chunk_size, &SEPARATORS, &mut pieces);

    let mut result = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0;
    for piece in pieces {
        let len = char_len(piece);
        if total + len > config.chunk_size && !window.is_empty() {
            push_trimmed(&mut result, &window);
            while total > config.chunk_overlap || (total > 0 && total + len > config.chunk_size) {
                let Some(front) = window.pop_front() else {
                    break;
                };
                total -= char_len(front);
            }
        }
        window.push_back(piece);
        total += len;
    }
    if !window.is_empty() {
        push_trimmed(&mut result, &window);
    }
    result
}

fn push_trimmed(result: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        result.push(trimmed.to_string());
    }
}

/// Pieces keep their trailing separator, so concatenating them restores the text.
fn split_pieces<'a>(text: &'a str, max: usize, separators: &[&str], out: &mut Vec<&'a str>) {
    if char_len(text) <= max {
        if !text.is_empty() {
            out.push(text);
        }
        return;
    }
    let Some((separator, rest)) = separators.split_first() else {
        hard_cut(text, max, out);
        return;
    };
    for part in text.split_inclusive(separator) {
        split_pieces(part, max, rest, out);
    }
}

fn hard_cut<'a>(text: &'a str, max: usize, out: &mut Vec<&'a str>) {
    let mut remaining = text;
    while !remaining.is_empty() {
        let cut = remaining
            .char_indices()
            .nth(max)
            .map_or(remaining.len(), |(i, _)| i);
        let (head, tail) = remaining.split_at(cut);
        out.push(head);
        remaining = tail;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("chunk size must be greater than zero")]
    ZeroSize,
    #[error("chunk overlap {overlap} must be smaller than chunk size {size}")]
    OverlapTooLarge { overlap: usize, size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document {
            source: PathBuf::from("test.txt"),
            text: text.to_string(),
        }
    }

    fn config(size: usize, overlap: usize, policy: SplitPolicy) -> ChunkConfig {
        ChunkConfig {
            chunk_size: size,
            chunk_overlap: overlap,
            policy,
        }
    }

    #[test]
    fn chunk_short_document() {
        let c = chunk_document(&doc("One paragraph."), &ChunkConfig::default()).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].text, "One paragraph.");
        assert_eq!(c[0].source, PathBuf::from("test.txt"));
    }

    #[test]
    fn paragraphs_merge_up_to_size() {
        let c = chunk_document(&doc("P1\n\nP2\n\nP3"), &config(8, 0, SplitPolicy::Boundaries)).unwrap();
        let texts: Vec<&str> = c.iter().map(|ch| ch.text.as_str()).collect();
        assert_eq!(texts, vec!["P1\n\nP2", "P3"]);
        assert_eq!(c[1].index, 1);
    }

    #[test]
    fn long_paragraph_respects_size() {
        let long = "word ".repeat(200);
        let c = chunk_document(&doc(&long), &config(50, 0, SplitPolicy::Boundaries)).unwrap();
        assert!(c.len() >= 20);
        assert!(c.iter().all(|ch| char_len(&ch.text) <= 50));
    }

    #[test]
    fn unbroken_text_is_hard_cut() {
        let long = "a".repeat(600);
        let c = chunk_document(&doc(&long), &config(200, 0, SplitPolicy::Boundaries)).unwrap();
        assert_eq!(c.len(), 3);
        assert!(c.iter().all(|ch| ch.text.len() == 200));
    }

    #[test]
    fn boundary_chunks_carry_overlap() {
        let text = "aaaa bbbb cccc dddd eeee";
        let c = chunk_document(&doc(text), &config(10, 5, SplitPolicy::Boundaries)).unwrap();
        assert!(c.iter().all(|ch| char_len(&ch.text) <= 10));
        for pair in c.windows(2) {
            let first_last_word = pair[0].text.rsplit(' ').next().unwrap();
            assert!(pair[1].text.starts_with(first_last_word), "{pair:?}");
        }
    }

    #[test]
    fn fixed_windows_overlap_exactly() {
        let text: String = ('a'..='z').cycle().take(95).collect();
        let (size, overlap) = (20, 5);
        let c = chunk_document(&doc(&text), &config(size, overlap, SplitPolicy::Fixed)).unwrap();
        assert!(c.iter().all(|ch| char_len(&ch.text) <= size));
        for pair in c.windows(2) {
            let tail: String = pair[0].text.chars().skip(size - overlap).collect();
            let head: String = pair[1].text.chars().take(overlap).collect();
            assert_eq!(tail, head);
        }
        let last = c.last().unwrap();
        assert!(text.ends_with(&last.text));
    }

    #[test]
    fn fixed_windows_without_overlap_partition_text() {
        let text = "0123456789abcdef";
        let c = chunk_document(&doc(text), &config(5, 0, SplitPolicy::Fixed)).unwrap();
        let texts: Vec<&str> = c.iter().map(|ch| ch.text.as_str()).collect();
        assert_eq!(texts, vec!["01234", "56789", "abcde", "f"]);
    }

    #[test]
    fn multibyte_text_counts_characters() {
        let text = "é".repeat(30);
        let c = chunk_document(&doc(&text), &config(10, 0, SplitPolicy::Boundaries)).unwrap();
        assert_eq!(c.len(), 3);
        assert!(c.iter().all(|ch| char_len(&ch.text) == 10));
    }

    #[test]
    fn empty_document_has_no_chunks() {
        assert!(chunk_document(&doc("  \n\n "), &ChunkConfig::default()).unwrap().is_empty());
        assert!(chunk_document(&doc(""), &config(10, 0, SplitPolicy::Fixed)).unwrap().is_empty());
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let err = chunk_document(&doc("x"), &config(10, 10, SplitPolicy::Fixed)).unwrap_err();
        assert!(matches!(err, ChunkError::OverlapTooLarge { .. }));
    }

    #[test]
    fn chunk_documents_keeps_per_document_indices() {
        let docs = vec![doc("one"), doc("two")];
        let c = chunk_documents(&docs, &ChunkConfig::default()).unwrap();
        assert_eq!(c.len(), 2);
        assert!(c.iter().all(|ch| ch.index == 0));
    }
}
