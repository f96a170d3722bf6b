use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Index not found at {}; run `tutor ingest` first", .0.display())]
    IndexMissing(PathBuf),

    #[error("Could not extract text from {}: {reason}", path.display())]
    ExtractionFailure { path: PathBuf, reason: String },

    #[error("Embedding service failed: {0}")]
    EmbeddingService(String),

    #[error("Completion service failed: {0}")]
    CompletionService(String),

    #[error("Malformed generation output: {0}")]
    MalformedOutput(String),

    #[error("Corrupt index snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
