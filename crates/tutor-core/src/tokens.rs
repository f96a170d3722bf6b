//! Cheap token-count approximation.
//!
//! Not a tokenizer. For English prose a BPE tokenizer averages roughly four
//! characters per token, and this estimate typically lands within ±25% of the
//! real count; code, URLs and non-Latin scripts can be off by 2x or more.
//! Anything that needs exact counts should implement [`TokenEstimator`] over a
//! real tokenizer instead.

use crate::traits::TokenEstimator;

#[derive(Debug, Clone, Copy)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
}

impl CharRatioEstimator {
    pub const DEFAULT_CHARS_PER_TOKEN: usize = 4;

    pub fn new(chars_per_token: usize) -> Self { Self { chars_per_token: chars_per_token.max(1) } }
}

impl Default for CharRatioEstimator {
    fn default() -> Self { Self::new(Self::DEFAULT_CHARS_PER_TOKEN) }
}

impl TokenEstimator for CharRatioEstimator {
    /// `chars / ratio`, never below 1 so every non-empty segment costs something.
    fn estimate(&self, text: &str) -> usize { (text.chars().count() / self.chars_per_token).max(1) }

    fn chars_for(&self, tokens: usize) -> usize { tokens.saturating_mul(self.chars_per_token) }
}
