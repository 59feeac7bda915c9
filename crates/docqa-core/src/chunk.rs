//! Overlapping, boundary-aware text chunker.
//!
//! Splits a document's decoded text into [`Chunk`]s of at most
//! `max_chunk_size` chars. Consecutive chunks share exactly
//! `overlap_size` chars so a passage cut at a chunk edge is still whole in
//! one of its neighbours.
//!
//! # Algorithm
//!
//! 1. If the text fits in `max_chunk_size`, emit a single chunk.
//! 2. Otherwise take the window `[start, start + max_chunk_size)`.
//! 3. Within the last `boundary_window` chars of that window, look for the
//!    paragraph break (`\n\n`) nearest the budget; failing that, the
//!    nearest sentence end (`.`, `!`, `?` followed by whitespace, or a
//!    newline). Failing both, cut hard at the budget.
//! 4. The next chunk starts `overlap_size` chars before the cut.
//! 5. The final chunk ends at the end of the text and may be shorter.
//!
//! Cuts are never placed at or before `start + overlap_size`, so every step
//! makes progress.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::{chunk_text, ChunkConfig};
//!
//! let config = ChunkConfig::new(1000, 100).unwrap();
//! let text = "x".repeat(3000);
//! let chunks = chunk_text("doc-1", &text, &config).unwrap();
//! let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.start, c.end)).collect();
//! assert_eq!(spans, vec![(0, 1000), (900, 1900), (1800, 2800), (2700, 3000)]);
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{QaError, Result};
use crate::models::Chunk;

/// Chunking parameters. All sizes are in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub max_chunk_size: usize,
    /// Chars shared by consecutive chunks. Must be `< max_chunk_size`.
    pub overlap_size: usize,
    /// How far back from the budget to look for a paragraph or sentence break.
    pub boundary_window: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            overlap_size: 100,
            boundary_window: 200,
        }
    }
}

impl ChunkConfig {
    /// Build a validated config with the default boundary window.
    pub fn new(max_chunk_size: usize, overlap_size: usize) -> Result<Self> {
        let config = Self {
            max_chunk_size,
            overlap_size,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_boundary_window(mut self, window: usize) -> Self {
        self.boundary_window = window;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_size == 0 {
            return Err(QaError::InvalidConfig(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.overlap_size >= self.max_chunk_size {
            return Err(QaError::InvalidConfig(format!(
                "overlap_size ({}) must be less than max_chunk_size ({})",
                self.overlap_size, self.max_chunk_size
            )));
        }
        Ok(())
    }
}

/// Split `text` into ordered, overlapping chunks.
///
/// # Guarantees
///
/// - Deterministic boundaries for the same `(text, config)`.
/// - Chunks cover the whole text with no gaps; chunk `i + 1` starts exactly
///   `overlap_size` chars before chunk `i` ends.
/// - Text that fits in one chunk (including empty text) yields exactly one.
/// - Chunk ids are fresh UUIDs, so re-chunking a document never collides
///   with the chunks of a previous version.
///
/// # Errors
///
/// [`QaError::InvalidConfig`] if `overlap_size >= max_chunk_size`.
pub fn chunk_text(document_id: &str, text: &str, config: &ChunkConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    // Byte offset of every char, plus one past the end, for slicing.
    let mut byte_at: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    byte_at.push(text.len());

    let slice = |start: usize, end: usize| &text[byte_at[start]..byte_at[end]];

    if total <= config.max_chunk_size {
        return Ok(vec![make_chunk(document_id, 0, 0, total, text)]);
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let hard_end = (start + config.max_chunk_size).min(total);
        if hard_end == total {
            chunks.push(make_chunk(
                document_id,
                chunks.len(),
                start,
                total,
                slice(start, total),
            ));
            break;
        }

        let end = find_cut(&chars, start, hard_end, config);
        chunks.push(make_chunk(
            document_id,
            chunks.len(),
            start,
            end,
            slice(start, end),
        ));
        start = end - config.overlap_size;
    }

    Ok(chunks)
}

/// Rebuild the original text from chunks produced with `overlap_size`.
///
/// The first chunk contributes all of its text; every later chunk
/// contributes everything after its leading overlap.
pub fn reassemble(chunks: &[Chunk], overlap_size: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(overlap_size));
        }
    }
    out
}

/// Pick the cut position (exclusive end) for the chunk starting at `start`.
fn find_cut(chars: &[char], start: usize, hard_end: usize, config: &ChunkConfig) -> usize {
    let floor = (start + config.overlap_size + 1)
        .max(hard_end.saturating_sub(config.boundary_window));
    if floor >= hard_end {
        return hard_end;
    }

    let paragraph = (floor..=hard_end)
        .rev()
        .find(|&p| p >= 2 && chars[p - 1] == '\n' && chars[p - 2] == '\n');
    if let Some(p) = paragraph {
        return p;
    }

    let sentence = (floor..=hard_end).rev().find(|&p| {
        let prev = chars[p - 1];
        prev == '\n'
            || (matches!(prev, '.' | '!' | '?')
                && chars.get(p).map_or(true, |c| c.is_whitespace()))
    });

    sentence.unwrap_or(hard_end)
}

/// Hex-encoded SHA-256 of `text`.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create a single [`Chunk`] with a fresh UUID and SHA-256 content hash.
fn make_chunk(document_id: &str, index: usize, start: usize, end: usize, text: &str) -> Chunk {
    let hash = sha256_hex(text);

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        start,
        end,
        text: text.to_string(),
        hash,
        embedding: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(chunks: &[Chunk]) -> Vec<(usize, usize)> {
        chunks.iter().map(|c| (c.start, c.end)).collect()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let config = ChunkConfig::default();
        let chunks = chunk_text("doc1", "Hello, world!", &config).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 13));
    }

    #[test]
    fn test_empty_text() {
        let chunks = chunk_text("doc1", "", &ChunkConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_empty());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_budget() {
        let bad = ChunkConfig {
            max_chunk_size: 100,
            overlap_size: 100,
            boundary_window: 10,
        };
        let err = chunk_text("doc1", "abc", &bad).unwrap_err();
        assert!(matches!(err, QaError::InvalidConfig(_)));
        assert!(ChunkConfig::new(0, 0).is_err());
    }

    #[test]
    fn test_hard_cuts_without_boundaries() {
        let config = ChunkConfig::new(1000, 100).unwrap();
        let text = "abcdefghij".repeat(300);
        let chunks = chunk_text("doc1", &text, &config).unwrap();
        assert_eq!(
            spans(&chunks),
            vec![(0, 1000), (900, 1900), (1800, 2800), (2700, 3000)]
        );
        assert_eq!(chunks[3].len(), 300);
    }

    #[test]
    fn test_prefers_paragraph_break_near_budget() {
        let config = ChunkConfig::new(100, 10).unwrap();
        let first = "a".repeat(80);
        let text = format!("{first}\n\n{}", "b".repeat(200));
        let chunks = chunk_text("doc1", &text, &config).unwrap();
        assert_eq!(chunks[0].end, 82);
        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[1].start, 72);
    }

    #[test]
    fn test_falls_back_to_sentence_break() {
        let config = ChunkConfig::new(100, 10).unwrap();
        let text = format!("{}. {}", "a".repeat(90), "b".repeat(200));
        let chunks = chunk_text("doc1", &text, &config).unwrap();
        assert_eq!(chunks[0].end, 91);
        assert!(chunks[0].text.ends_with('.'));
    }

    #[test]
    fn test_boundary_outside_window_is_ignored() {
        let config = ChunkConfig::new(100, 10).unwrap().with_boundary_window(5);
        let text = format!("{}\n\n{}", "a".repeat(50), "b".repeat(200));
        let chunks = chunk_text("doc1", &text, &config).unwrap();
        assert_eq!(chunks[0].end, 100);
    }

    #[test]
    fn test_consecutive_chunks_overlap_exactly() {
        let config = ChunkConfig::new(120, 30).unwrap();
        let text = (0..60)
            .map(|i| format!("Sentence number {} is here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text("doc1", &text, &config).unwrap();
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end - pair[1].start, 30);
            assert!(pair[0].len() <= 120);
        }
        assert_eq!(chunks.last().unwrap().end, text.chars().count());
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let config = ChunkConfig::new(50, 5).unwrap();
        let text = (0..50)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text("doc1", &text, &config).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_multibyte_utf8_offsets_are_chars() {
        let config = ChunkConfig::new(10, 2).unwrap();
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let chunks = chunk_text("doc1", text, &config).unwrap();
        for c in &chunks {
            assert_eq!(c.text.chars().count(), c.len());
        }
        assert_eq!(reassemble(&chunks, 2), text);
    }

    #[test]
    fn test_reassemble_reconstructs_text() {
        let config = ChunkConfig::new(64, 16).unwrap();
        let text = "Alpha beta gamma.\n\nDelta epsilon! Zeta eta theta? Iota kappa lambda mu nu xi omicron pi rho sigma tau upsilon phi chi psi omega.".repeat(4);
        let chunks = chunk_text("doc1", &text, &config).unwrap();
        assert_eq!(reassemble(&chunks, 16), text);
    }

    #[test]
    fn test_deterministic_boundaries() {
        let config = ChunkConfig::new(20, 4).unwrap();
        let text = "Alpha\n\nBeta. Gamma\n\nDelta epsilon zeta eta theta";
        let c1 = chunk_text("doc1", text, &config).unwrap();
        let c2 = chunk_text("doc1", text, &config).unwrap();
        assert_eq!(spans(&c1), spans(&c2));
        for (a, b) in c1.iter().zip(c2.iter()) {
            assert_eq!(a.hash, b.hash);
            assert_ne!(a.id, b.id);
        }
    }
}
