//! Document chunking: fixed-size, overlapping segments for semantic search.
//!
//! The pipeline is three-stage:
//! 1. Paragraph pass: greedy accumulation of blank-line units up to
//!    `chunk_size`, seeding each new buffer with the previous chunk's
//!    trailing `chunk_overlap` characters.
//! 2. Sentence guard: any chunk above `1.5 x chunk_size` is re-split at
//!    sentence boundaries, with the overlap carried as the last two
//!    sentence segments instead of a character window.
//! 3. Word guard: a chunk the sentence pass cannot shrink (no sentence
//!    boundaries at all) is cut into word windows of at most `chunk_size`
//!    fresh characters, prefixed with the character overlap, so the
//!    `1.5 x chunk_size` bound holds for every emitted chunk.
//!
//! Normalization collapses all whitespace runs to a single space before
//! the paragraph split, so multi-paragraph structure usually reaches the
//! sentence guard as one candidate. That ordering is intentional and
//! load-bearing for chunk identity stability; do not reorder.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ChunkingConfig;
use crate::types::{ChunkOutcome, ChunkStats, DocumentChunk};

/// Splits raw document text into an ordered sequence of overlapping chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    max_chunks: usize,
}

impl Chunker {
    pub fn new(cfg: &ChunkingConfig) -> Self {
        Self {
            chunk_size: cfg.chunk_size,
            chunk_overlap: cfg.chunk_overlap,
            max_chunks: cfg.max_chunks_per_doc,
        }
    }

    /// Chunk a document. Empty or whitespace-only input yields an empty
    /// outcome, never an error.
    ///
    /// Every chunk's metadata is the caller's map plus `chunk_index`,
    /// `total_chunks` and `doc_id`. Offsets are character positions within
    /// the concatenation of emitted chunks.
    pub fn chunk(
        &self,
        text: &str,
        metadata: &BTreeMap<String, Value>,
        doc_id: &str,
    ) -> ChunkOutcome {
        let cleaned = clean_text(text);
        if cleaned.is_empty() {
            return ChunkOutcome::default();
        }

        // Paragraph pass over blank-line units of the cleaned text.
        let paragraphs: Vec<&str> = cleaned.split("\n\n").collect();
        let merged = self.merge_paragraphs(&paragraphs);

        // Oversize guards.
        let limit = self.chunk_size + self.chunk_size / 2;
        let mut texts: Vec<String> = Vec::new();
        for chunk in merged {
            if char_len(&chunk) <= limit {
                texts.push(chunk);
                continue;
            }
            for piece in self.merge_sentences(&split_sentences(&chunk)) {
                if char_len(&piece) <= limit {
                    texts.push(piece);
                } else {
                    texts.extend(self.split_words(&piece));
                }
            }
        }

        let mut truncated = false;
        if texts.len() > self.max_chunks {
            warn!(
                target: "oracle_rag::chunking",
                doc_id,
                produced = texts.len(),
                kept = self.max_chunks,
                "document exceeds max_chunks_per_doc; truncating"
            );
            texts.truncate(self.max_chunks);
            truncated = true;
        }

        let total = texts.len();
        let mut chunks = Vec::with_capacity(total);
        let mut offset = 0usize;
        for (idx, text) in texts.into_iter().enumerate() {
            let len = char_len(&text);
            let mut meta = metadata.clone();
            meta.insert("chunk_index".into(), Value::from(idx as u64));
            meta.insert("total_chunks".into(), Value::from(total as u64));
            meta.insert("doc_id".into(), Value::from(doc_id));
            chunks.push(DocumentChunk {
                text,
                metadata: meta,
                chunk_id: format!("{doc_id}_chunk_{idx}"),
                start_offset: offset,
                end_offset: offset + len,
            });
            offset += len;
        }

        debug!(
            target: "oracle_rag::chunking",
            doc_id,
            chunks = chunks.len(),
            truncated,
            "chunked document"
        );

        ChunkOutcome { chunks, truncated }
    }

    /// Greedy paragraph accumulation with a trailing character-window
    /// overlap between consecutive chunks.
    fn merge_paragraphs(&self, paragraphs: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for para in paragraphs {
            let para = para.trim();
            if para.is_empty() {
                continue;
            }

            if !current.is_empty() && char_len(&current) + char_len(para) > self.chunk_size {
                let closed = current.trim().to_string();
                let tail = char_tail(&closed, self.chunk_overlap).to_string();
                chunks.push(closed);
                current = if tail.is_empty() {
                    para.to_string()
                } else {
                    format!("{tail} {para}")
                };
            } else if current.is_empty() {
                current = para.to_string();
            } else {
                current.push_str("\n\n");
                current.push_str(para);
            }
        }

        let last = current.trim();
        if !last.is_empty() {
            chunks.push(last.to_string());
        }
        chunks
    }

    /// Greedy sentence accumulation. The overlap seeded into the next
    /// buffer is the last two `". "`-delimited segments of the closed
    /// chunk, not a character window.
    fn merge_sentences(&self, sentences: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();

        for sentence in sentences {
            if sentence.trim().is_empty() {
                continue;
            }

            if !current.is_empty() && char_len(&current) + char_len(sentence) > self.chunk_size {
                let closed = current.trim().to_string();
                let parts: Vec<&str> = closed.split(". ").collect();
                let tail = parts[parts.len().saturating_sub(2)..].join(". ");
                chunks.push(closed);
                current = format!("{tail} {sentence}");
            } else if current.is_empty() {
                current = sentence.clone();
            } else {
                current.push(' ');
                current.push_str(sentence);
            }
        }

        let last = current.trim();
        if !last.is_empty() {
            chunks.push(last.to_string());
        }
        chunks
    }

    /// Hard word-window split for text without usable sentence boundaries.
    ///
    /// Windows hold at most `chunk_size` characters of fresh content; each
    /// window after the first is prefixed with the previous window's
    /// trailing `chunk_overlap` characters.
    fn split_words(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut fresh = String::new();
        let mut prev_tail = String::new();

        let compose = |tail: &str, fresh: &str| {
            if tail.is_empty() {
                fresh.to_string()
            } else {
                format!("{tail} {fresh}")
            }
        };

        for word in text.split_whitespace() {
            if char_len(word) > self.chunk_size {
                // Pathological unbroken token: flush and emit fixed windows.
                if !fresh.is_empty() {
                    chunks.push(compose(&prev_tail, &fresh));
                    fresh.clear();
                    prev_tail.clear();
                }
                chunks.extend(char_windows(word, self.chunk_size));
                continue;
            }

            if !fresh.is_empty() && char_len(&fresh) + 1 + char_len(word) > self.chunk_size {
                let chunk = compose(&prev_tail, &fresh);
                prev_tail = char_tail(&fresh, self.chunk_overlap).to_string();
                chunks.push(chunk);
                fresh = word.to_string();
            } else if fresh.is_empty() {
                fresh = word.to_string();
            } else {
                fresh.push(' ');
                fresh.push_str(word);
            }
        }

        if !fresh.is_empty() {
            chunks.push(compose(&prev_tail, &fresh));
        }
        chunks
    }
}

/// Aggregate length statistics over one chunk batch.
pub fn chunk_stats(chunks: &[DocumentChunk]) -> ChunkStats {
    if chunks.is_empty() {
        return ChunkStats::default();
    }
    let lengths: Vec<usize> = chunks.iter().map(|c| char_len(&c.text)).collect();
    let total: usize = lengths.iter().sum();
    ChunkStats {
        count: chunks.len(),
        avg_length: total / lengths.len(),
        min_length: lengths.iter().copied().min().unwrap_or(0),
        max_length: lengths.iter().copied().max().unwrap_or(0),
        total_chars: total,
    }
}

/// Collapse whitespace runs to a single space, strip control characters,
/// trim.
fn clean_text(text: &str) -> String {
    let stripped: String = text.chars().filter(|c| !is_stripped_control(*c)).collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Control characters removed during normalization. Tab/newline/CR survive
/// here and collapse as whitespace instead.
fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{0000}'..='\u{0008}' | '\u{000B}' | '\u{000C}' | '\u{000E}'..='\u{001F}' | '\u{007F}')
}

/// Split at whitespace following a sentence terminator (`.` `!` `?`).
fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut prev_was_terminal = false;

    for (i, c) in text.char_indices() {
        if prev_was_terminal && c.is_whitespace() {
            let seg = text[start..i].trim();
            if !seg.is_empty() {
                out.push(seg.to_string());
            }
            start = i;
        }
        prev_was_terminal = matches!(c, '.' | '!' | '?');
    }

    let last = text[start..].trim();
    if !last.is_empty() {
        out.push(last.to_string());
    }
    out
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s` (the whole string when shorter).
fn char_tail(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    s.char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| &s[i..])
        .unwrap_or(s)
}

/// Fixed-size character windows, no overlap. Used only for tokens longer
/// than the chunk size.
fn char_windows(s: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|w| w.iter().collect())
        .collect()
}
