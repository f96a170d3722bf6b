use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use tutor_core::traits::Embedder;
use tutor_core::Result;

/// Hashing bag-of-words embedder for offline runs and tests.
///
/// Each lowercased word lands in a bucket chosen by its xxHash, so texts
/// sharing vocabulary get similar vectors. Output is unit length.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:xxh64:{dim}") }
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let words = text.split_whitespace().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase()).filter(|w| !w.is_empty());
        for (i, word) in words.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            word.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.5 + val + (i as f32 % 3.0) * 0.01;
        }
        crate::normalize(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn max_batch(&self) -> usize { 256 }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}
