use async_trait::async_trait;

use crate::error::Result;
use crate::types::CompletionRequest;

/// A text embedding backend.
///
/// Implementations return one vector per input, in input order, all of the
/// same dimensionality for a given `embedder_id`. Callers must not send more
/// than `max_batch` texts per call.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `openai:text-embedding-3-large`).
    fn embedder_id(&self) -> &str;
    fn max_batch(&self) -> usize;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// A chat-completion backend returning the assistant message text.
#[async_trait]
pub trait Completer: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Token count approximation used for chunk budgeting.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
    /// Number of characters that corresponds to `tokens` tokens.
    fn chars_for(&self, tokens: usize) -> usize;
}
