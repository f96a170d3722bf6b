//! Sentence-packing chunker with a trailing character overlap.
//!
//! Text is split after `.`, `!` or `?` followed by whitespace, and sentences
//! are packed into a buffer until the estimated token budget would be
//! exceeded. Each flushed chunk seeds the next buffer with its last
//! `overlap_tokens` worth of characters.

use regex::Regex;
use std::sync::OnceLock;

use crate::tokens::CharRatioEstimator;
use crate::traits::TokenEstimator;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    /// Hard ceiling on a single chunk, in characters.
    pub max_chunk_chars: usize,
    /// Documents longer than this (in characters) are truncated before splitting.
    pub max_document_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_tokens: 300, overlap_tokens: 50, max_chunk_chars: 350 * 4, max_document_chars: 2_000_000 }
    }
}

pub struct Chunker {
    config: ChunkingConfig,
    estimator: Box<dyn TokenEstimator>,
}

impl Default for Chunker {
    fn default() -> Self { Self::new(ChunkingConfig::default()) }
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self { Self::with_estimator(config, Box::new(CharRatioEstimator::default())) }

    pub fn with_estimator(config: ChunkingConfig, estimator: Box<dyn TokenEstimator>) -> Self { Self { config, estimator } }

    pub fn config(&self) -> &ChunkingConfig { &self.config }

    /// Split `text` into chunks in document order. Deterministic; every chunk
    /// is non-empty and at most `max_chunk_chars` characters.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let text = truncate_chars(text, self.config.max_document_chars);
        let mut chunks = Vec::new();
        let mut buf: Vec<String> = Vec::new();
        let mut tokens = 0usize;

        for segment in split_sentences(text) {
            let segment = segment.trim();
            if segment.is_empty() { continue; }
            let est = self.estimator.estimate(segment);
            if tokens + est > self.config.max_tokens && !buf.is_empty() {
                let joined = buf.join(" ");
                self.flush(&joined, &mut chunks);
                buf.clear();
                tokens = 0;
                let tail = tail_chars(joined.trim(), self.estimator.chars_for(self.config.overlap_tokens)).trim();
                if !tail.is_empty() {
                    tokens = self.estimator.estimate(tail);
                    buf.push(tail.to_string());
                }
            }
            buf.push(segment.to_string());
            tokens += est;
        }
        if !buf.is_empty() { self.flush(&buf.join(" "), &mut chunks); }
        chunks
    }

    fn flush(&self, joined: &str, chunks: &mut Vec<String>) {
        let clamped = truncate_chars(joined.trim(), self.config.max_chunk_chars).trim_end();
        if !clamped.is_empty() { chunks.push(clamped.to_string()); }
    }
}

/// Chunk with the default character ceilings and the given token budget.
pub fn chunk(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    Chunker::new(ChunkingConfig { max_tokens, overlap_tokens, ..ChunkingConfig::default() }).chunk(text)
}

fn sentence_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").expect("sentence regex"))
}

/// Split after terminal punctuation, consuming the whitespace run that follows it.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for m in sentence_break().find_iter(text) {
        // the punctuation mark is a single ASCII byte
        out.push(&text[start..m.start() + 1]);
        start = m.end();
    }
    out.push(&text[start..]);
    out
}

/// Prefix of `s` holding at most `max` characters, cut on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Suffix of `s` holding at most `n` characters.
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 { return ""; }
    let count = s.chars().count();
    if count <= n { return s; }
    match s.char_indices().nth(count - n) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_after_terminal_punctuation_only() {
        let parts = split_sentences("One. Two!  Three? Four 3.5 five");
        assert_eq!(parts, vec!["One.", "Two!", "Three?", "Four 3.5 five"]);
    }

    #[test]
    fn tail_and_truncate_respect_char_boundaries() {
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
        assert_eq!(tail_chars("abc", 10), "abc");
        assert_eq!(tail_chars("abc", 0), "");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hé", 10), "hé");
    }
}
