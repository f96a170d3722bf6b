use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::chunker::{Chunker, ChunkingConfig};
use crate::extract::extract;
use crate::types::Chunk;

/// Outcome of walking a sources directory.
#[derive(Debug, Default)]
pub struct ProcessedCorpus {
    pub chunks: Vec<Chunk>,
    pub files_indexed: usize,
    pub files_skipped: Vec<PathBuf>,
}

impl ProcessedCorpus {
    pub fn source_count(&self) -> usize {
        let mut sources: Vec<&str> = self.chunks.iter().map(|c| c.source.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        sources.len()
    }
}

#[derive(Default)]
pub struct DataProcessor {
    chunker: Chunker,
}

impl DataProcessor {
    pub fn new(config: ChunkingConfig) -> Self { Self { chunker: Chunker::new(config) } }

    pub fn with_chunker(chunker: Chunker) -> Self { Self { chunker } }

    /// Extract and chunk every file under `data_dir`.
    ///
    /// Files whose extraction fails are logged and skipped; they never abort
    /// the walk. A missing directory yields an empty corpus.
    pub fn process_directory(&self, data_dir: &Path) -> ProcessedCorpus {
        let files = list_source_files(data_dir);
        let mut corpus = ProcessedCorpus::default();
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no source files found");
            return corpus;
        }
        for (file_index, file_path) in files.iter().enumerate() {
            let source = source_name(file_path, data_dir);
            let text = match extract(file_path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(file = %source, error = %e, "read failed, skipping");
                    corpus.files_skipped.push(file_path.clone());
                    continue;
                }
            };
            let pieces = self.chunker.chunk(&text);
            info!(file = %source, chunks = pieces.len(), "processed {}/{}", file_index + 1, files.len());
            corpus.chunks.extend(pieces.into_iter().enumerate().map(|(ordinal, text)| Chunk { source: source.clone(), ordinal, text }));
            corpus.files_indexed += 1;
        }
        info!(files = corpus.files_indexed, chunks = corpus.chunks.len(), skipped = corpus.files_skipped.len(), "processed sources");
        corpus
    }
}

/// Regular, non-hidden files under `root`, sorted by path.
fn list_source_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Path relative to the sources root with `/` separators.
fn source_name(file_path: &Path, data_dir: &Path) -> String {
    let relative = file_path.strip_prefix(data_dir).unwrap_or(file_path);
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}
