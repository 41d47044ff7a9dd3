//! Recursive sliding-window text chunker.
//!
//! Splits each [`Segment`] independently into [`Chunk`]s of at most
//! `chunk_size` characters, with consecutive chunks sharing at most
//! `overlap` characters. Splitting tries separators in priority order
//! (paragraph break, line break, sentence end, word boundary) and falls
//! back to a hard cut at individual characters.
//!
//! Lengths are measured in `char`s, never bytes, so multi-byte text is
//! never cut inside a code point.
//!
//! Each chunk receives a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::{RagError, Result};
use crate::models::{Chunk, Segment};

/// Separators in priority order. The empty separator means "between any
/// two characters" and always applies.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// `overlap` is clamped below `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Chunk every segment; chunk indices are contiguous across the whole
    /// document.
    ///
    /// Fails with [`RagError::EmptyInput`] when no segment contains any
    /// non-whitespace text.
    pub fn split(&self, segments: &[Segment]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for segment in segments {
            for text in self.split_text(&segment.text) {
                chunks.push(make_chunk(segment, chunks.len(), &text));
            }
        }
        if chunks.is_empty() {
            let source = segments
                .first()
                .map(|s| s.source.clone())
                .unwrap_or_else(|| "<no segments>".to_string());
            return Err(RagError::EmptyInput(source));
        }
        Ok(chunks)
    }

    /// Split raw text into trimmed, non-empty windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s))
            .unwrap_or(separators.len() - 1);
        let separator = separators[position];
        let finer = &separators[position + 1..];

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece.trim().to_string());
            } else {
                out.extend(self.split_recursive(piece, finer));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge(&fitting, separator));
        }
        out
    }

    /// Greedily pack pieces into windows of at most `chunk_size`, carrying
    /// the tail (at most `overlap` chars) of each window into the next.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut windows = Vec::new();
        let mut current: std::collections::VecDeque<&str> = std::collections::VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };
            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_window(&mut windows, &current, separator);
                while total > self.overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front) + if current.is_empty() { 0 } else { sep_len };
                }
            }
            let joiner = if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
            total += len + joiner;
        }
        push_window(&mut windows, &current, separator);
        windows
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

fn push_window(windows: &mut Vec<String>, current: &std::collections::VecDeque<&str>, separator: &str) {
    let joined = current.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn make_chunk(segment: &Segment, index: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: segment.document_id.clone(),
        source: segment.source.clone(),
        segment_index: segment.index,
        page: segment.page,
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
