//! Full rebuild of the index from a sources directory.

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use tutor_core::data_processor::DataProcessor;
use tutor_core::traits::Embedder;
use tutor_core::{Error, Result};
use tutor_embed::embed_all;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub chunks_indexed: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    /// Vectors carried over from the previous snapshot instead of re-embedded.
    pub reused_vectors: usize,
    /// Generation published by this build; `None` when nothing was written.
    pub generation: Option<String>,
}

pub struct IndexBuilder {
    processor: DataProcessor,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    progress: bool,
}

impl IndexBuilder {
    pub fn new(processor: DataProcessor, embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self { processor, embedder, batch_size: batch_size.max(1), progress: true }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Extract, chunk and embed everything under `sources_dir`, then commit
    /// the result as one new snapshot.
    ///
    /// An empty corpus leaves any committed snapshot untouched. An embedding
    /// failure aborts before anything is written.
    pub async fn build(&self, sources_dir: &Path, store: &SnapshotStore) -> Result<BuildReport> {
        let corpus = self.processor.process_directory(sources_dir);
        let mut report = BuildReport { files_indexed: corpus.files_indexed, files_skipped: corpus.files_skipped.len(), ..BuildReport::default() };
        if corpus.chunks.is_empty() {
            warn!(dir = %sources_dir.display(), "no chunks produced; keeping the existing index");
            return Ok(report);
        }

        let previous = self.previous_vectors(store);
        let mut rows: Vec<Option<Vec<f32>>> = corpus.chunks.iter().map(|c| previous.get(&blake3::hash(c.text.as_bytes())).cloned()).collect();
        report.reused_vectors = rows.iter().filter(|r| r.is_some()).count();
        let missing: Vec<usize> = rows.iter().enumerate().filter(|(_, r)| r.is_none()).map(|(i, _)| i).collect();
        let texts: Vec<String> = missing.iter().map(|&i| corpus.chunks[i].text.clone()).collect();
        info!(chunks = corpus.chunks.len(), to_embed = texts.len(), reused = report.reused_vectors, embedder = self.embedder.embedder_id(), "building index");

        let pb = if self.progress && !texts.is_empty() { ProgressBar::new(texts.len() as u64) } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}") {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message("embedding");
        let embedded = embed_all(self.embedder.as_ref(), &texts, self.batch_size, |n| pb.inc(n as u64)).await;
        let embedded = match embedded {
            Ok(v) => v,
            Err(e) => {
                pb.abandon_with_message("embedding failed");
                return Err(e);
            }
        };
        pb.finish_with_message("embedded");
        for (i, v) in missing.into_iter().zip(embedded) { rows[i] = Some(v); }

        let rows: Vec<Vec<f32>> = rows.into_iter().map(|r| r.ok_or_else(|| Error::EmbeddingService("chunk left without a vector".into()))).collect::<Result<_>>()?;
        let dim = rows.first().map(Vec::len).unwrap_or(0);
        let chunks_indexed = rows.len();
        let snapshot = Snapshot::new(dim, rows, corpus.chunks)?;
        let manifest = store.commit(&snapshot, self.embedder.embedder_id())?;

        report.chunks_indexed = chunks_indexed;
        report.generation = Some(manifest.generation);
        info!(chunks = report.chunks_indexed, files = report.files_indexed, skipped = report.files_skipped, reused = report.reused_vectors, "index built");
        Ok(report)
    }

    /// Vectors of the committed snapshot keyed by chunk text hash, when it was
    /// produced by the same embedder. Unreadable snapshots are ignored.
    fn previous_vectors(&self, store: &SnapshotStore) -> HashMap<blake3::Hash, Vec<f32>> {
        let mut out = HashMap::new();
        let (manifest, snapshot) = match store.load_current() {
            Ok(current) => current,
            Err(Error::IndexMissing(_)) => return out,
            Err(e) => {
                warn!(error = %e, "previous snapshot unreadable; embedding everything");
                return out;
            }
        };
        if manifest.embedder_id != self.embedder.embedder_id() { return out; }
        for (vector, chunk) in snapshot.rows() { out.insert(blake3::hash(chunk.text.as_bytes()), vector.to_vec()); }
        out
    }
}
