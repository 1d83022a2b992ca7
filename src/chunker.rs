//! # Text normalization and sentence chunking
//!
//! Turns raw extracted document text into overlapping, sentence-bounded
//! chunks sized for embedding and retrieval. Chunks keep enough surrounding
//! sentences to preserve context while staying small enough that a single
//! embedding still represents them well.
//!
//! Sentence boundaries use a deliberately simple heuristic: a `.`, `!`, or
//! `?` followed by whitespace and an ASCII uppercase letter. Abbreviations
//! ("e.g. The...") and mid-sentence capitals will occasionally be
//! misclassified; that is an accepted limitation of the heuristic, not
//! something this module tries to patch over.
//!
//! ## Quick example
//! ```
//! use sop_assist::chunker::{clean_text, SentenceChunker};
//!
//! let text = clean_text("First sentence.   Second\tsentence. Third one.");
//! let chunker = SentenceChunker::new(2, 0);
//! let chunks = chunker.split_text(&text);
//! assert_eq!(chunks.len(), 2);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

// A sentence ends at [.!?] when whitespace and an uppercase letter follow.
static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+[A-Z]").expect("valid sentence boundary pattern"));

/// Collapse all whitespace runs (spaces, tabs, newlines, form feeds) into
/// single spaces and trim the ends. Pure function, no error conditions.
pub fn clean_text(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}

/// One contiguous span of sentences from a single source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The chunk's text: window sentences joined by single spaces.
    pub text: String,
    /// Identifier of the source document (typically the file name).
    pub source_id: String,
    /// 1-based position of this chunk within its source.
    pub ordinal: usize,
    /// Number of chunks the source produced in total.
    pub total_in_source: usize,
}

/// Splits normalized text into sentence-bounded chunks with overlap.
///
/// A window of `chunk_size` sentences slides over the sentence sequence,
/// advancing `chunk_size - chunk_overlap` sentences per step (clamped to at
/// least 1, so the walk always terminates even when `chunk_overlap >=
/// chunk_size`). Consecutive chunks therefore share exactly `chunk_overlap`
/// sentences, except possibly the final chunk, which may be shorter.
#[derive(Debug, Clone, Copy)]
pub struct SentenceChunker {
    /// Sentences per chunk.
    pub chunk_size: usize,
    /// Sentences shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self {
            chunk_size: 20,
            chunk_overlap: 5,
        }
    }
}

impl SentenceChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Split `text` into sentences using the boundary heuristic, dropping
    /// empty sentences.
    fn split_sentences(text: &str) -> Vec<&str> {
        let mut sentences = Vec::new();
        let mut start = 0;
        for boundary in SENTENCE_BOUNDARY.find_iter(text) {
            // Keep the terminator with the sentence; the matched uppercase
            // letter opens the next one. `[A-Z]` is a single byte, so the
            // arithmetic stays on char boundaries.
            let end = boundary.start() + 1;
            sentences.push(&text[start..end]);
            start = boundary.end() - 1;
        }
        sentences.push(&text[start..]);

        sentences
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Produce the chunk texts for `text`.
    ///
    /// Non-empty input yields at least one chunk; chunks that normalize to
    /// empty content are skipped.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let sentences = Self::split_sentences(text);
        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < sentences.len() {
            let end = (start + self.chunk_size).min(sentences.len());
            let window = sentences[start..end].join(" ");
            let window = window.trim();
            if !window.is_empty() {
                chunks.push(window.to_string());
            }
            start += step;
        }

        chunks
    }

    /// Chunk a source document, attaching ordinal metadata to each chunk.
    pub fn chunk(&self, source_id: &str, text: &str) -> Vec<Chunk> {
        let texts = self.split_text(text);
        let total = texts.len();
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                text,
                source_id: source_id.to_string(),
                ordinal: i + 1,
                total_in_source: total,
            })
            .collect()
    }
}
