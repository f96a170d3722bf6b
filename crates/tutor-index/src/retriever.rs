use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use crate::handle::IndexHandle;
use crate::rerank::rerank;
use crate::snapshot::Snapshot;
use tutor_core::traits::Embedder;
use tutor_core::types::Hit;
use tutor_core::{Error, Result};
use tutor_embed::{dot, embed_query};

/// Smallest candidate pool handed to the reranker, whatever `k` is.
pub const MIN_CANDIDATES: usize = 4;

/// Exhaustive cosine search over the loaded snapshot with a lexical rerank.
pub struct Retriever {
    handle: Arc<IndexHandle>,
    embedder: Arc<dyn Embedder>,
    min_candidates: usize,
}

impl Retriever {
    pub fn new(handle: Arc<IndexHandle>, embedder: Arc<dyn Embedder>) -> Self { Self { handle, embedder, min_candidates: MIN_CANDIDATES } }

    pub fn with_min_candidates(mut self, min_candidates: usize) -> Self {
        self.min_candidates = min_candidates;
        self
    }

    pub fn handle(&self) -> &Arc<IndexHandle> { &self.handle }

    /// Top-`k` passages for `query`, most relevant first. Fewer than `k` when
    /// the index is smaller; empty when `k` is 0.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Hit>> {
        let loaded = self.handle.ensure_loaded(false)?;
        if k == 0 || loaded.snapshot.is_empty() { return Ok(Vec::new()); }
        let qvec = embed_query(self.embedder.as_ref(), query).await?;
        if qvec.len() != loaded.snapshot.dim() {
            return Err(Error::EmbeddingService(format!(
                "query vector has dimension {}, index {} has {}",
                qvec.len(), loaded.manifest.generation, loaded.snapshot.dim()
            )));
        }
        let hits = rank(&loaded.snapshot, &qvec, query, k, self.min_candidates);
        debug!(k, returned = hits.len(), generation = %loaded.manifest.generation, "retrieved");
        Ok(hits)
    }
}

/// Score every row, keep the `max(k, min_candidates)` best by cosine,
/// rerank, truncate to `k`. `qvec` must be unit length and match the
/// snapshot dimension.
pub fn rank(snapshot: &Snapshot, qvec: &[f32], query: &str, k: usize, min_candidates: usize) -> Vec<Hit> {
    let mut scored: Vec<(usize, f32)> = (0..snapshot.len()).map(|i| (i, dot(snapshot.row(i), qvec))).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(k.max(min_candidates));

    let mut hits: Vec<Hit> = scored
        .into_iter()
        .map(|(i, score)| {
            let c = &snapshot.meta()[i];
            Hit { text: c.text.clone(), source: c.source.clone(), ordinal: c.ordinal, score, lexical: 0.0 }
        })
        .collect();
    rerank(query, &mut hits);
    hits.truncate(k);
    hits
}
