//! Embedding backends and the batching/normalization pass shared by index
//! builds and query-time retrieval.

use std::sync::Arc;
use tracing::{debug, info};

use tutor_core::config::EmbeddingSettings;
use tutor_core::retry::RetryPolicy;
use tutor_core::traits::Embedder;
use tutor_core::{Error, Result};

mod fake;
mod openai;

pub use fake::FakeEmbedder;
pub use openai::{embeddings_body, parse_embeddings, OpenAiEmbedder};

/// Dimension of the offline embedder used when `APP_USE_FAKE_EMBEDDINGS` is set.
pub const FAKE_EMBEDDING_DIM: usize = 256;

/// Scale `v` to unit L2 norm in place. All-zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON { for x in v.iter_mut() { *x /= norm; } }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

/// Embed `texts` in batches of at most `batch_size` (and never more than the
/// backend's `max_batch`), returning unit-normalized vectors in input order.
///
/// `on_batch` is called with the number of texts embedded after every batch.
pub async fn embed_all<F: FnMut(usize)>(embedder: &dyn Embedder, texts: &[String], batch_size: usize, mut on_batch: F) -> Result<Vec<Vec<f32>>> {
    let batch = batch_size.min(embedder.max_batch()).max(1);
    let mut out: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for group in texts.chunks(batch) {
        let vectors = embedder.embed_batch(group).await?;
        if vectors.len() != group.len() {
            return Err(Error::EmbeddingService(format!("expected {} vectors, backend returned {}", group.len(), vectors.len())));
        }
        for mut v in vectors {
            if let Some(first) = out.first() {
                if first.len() != v.len() { return Err(Error::EmbeddingService(format!("inconsistent dimension: {} vs {}", first.len(), v.len()))); }
            }
            if v.is_empty() { return Err(Error::EmbeddingService("backend returned an empty vector".into())); }
            normalize(&mut v);
            out.push(v);
        }
        debug!(embedder = embedder.embedder_id(), batch = group.len(), done = out.len(), "embedded batch");
        on_batch(group.len());
    }
    Ok(out)
}

/// Embed a single query string, unit-normalized.
pub async fn embed_query(embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>> {
    let mut vectors = embed_all(embedder, &[query.to_string()], 1, |_| {}).await?;
    vectors.pop().ok_or_else(|| Error::EmbeddingService("no vector for query".into()))
}

/// The embedder named by configuration, or the deterministic offline one when
/// `APP_USE_FAKE_EMBEDDINGS` is `1`/`true`.
pub fn get_default_embedder(settings: &EmbeddingSettings, retry: RetryPolicy) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake {
        info!(dim = FAKE_EMBEDDING_DIM, "using fake embedder");
        return Ok(Arc::new(FakeEmbedder::new(FAKE_EMBEDDING_DIM)));
    }
    Ok(Arc::new(OpenAiEmbedder::new(settings, retry)?))
}
