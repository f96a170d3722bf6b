use std::sync::Arc;
use tracing::info;

use tutor_core::chunker::truncate_chars;
use tutor_core::config::AnswerSettings;
use tutor_core::traits::Completer;
use tutor_core::types::{ChatMessage, CompletionRequest, Hit};
use tutor_core::Result;
use tutor_index::Retriever;

const SYSTEM: &str = "You are a patient subject tutor. Answer using ONLY the numbered context passages provided. \
If the context does not contain the answer, say that you don't know. \
Be concise and well structured, and cite passages inline as (source #chunk), for example (biology.pdf #3).";

pub const NO_CONTEXT: &str = "[no context found]";

#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub hits: Vec<Hit>,
}

pub struct AnswerComposer {
    retriever: Arc<Retriever>,
    completer: Arc<dyn Completer>,
    model: String,
    settings: AnswerSettings,
}

impl AnswerComposer {
    pub fn new(retriever: Arc<Retriever>, completer: Arc<dyn Completer>, model: impl Into<String>, settings: AnswerSettings) -> Self {
        Self { retriever, completer, model: model.into(), settings }
    }

    /// Retrieve, then ask the completion backend to answer from those passages
    /// alone. The reply is returned verbatim with the hits it was given.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let hits = self.retriever.retrieve(query, self.settings.k).await?;
        let context = if hits.is_empty() { NO_CONTEXT.to_string() } else { format_context(&hits, self.settings.hit_chars) };
        let messages = vec![ChatMessage::system(SYSTEM), ChatMessage::user(format!("Question: {query}\n\nContext:\n{context}"))];
        let request = CompletionRequest::new(&self.model, messages, self.settings.temperature);
        let text = self.completer.complete(&request).await?;
        info!(hits = hits.len(), answer_chars = text.len(), "answered");
        Ok(Answer { text, hits })
    }
}

/// `[i] (source #ordinal): text` blocks, 1-based, separated by blank lines.
/// Passages longer than `max_chars` characters are cut and marked with `…`.
pub fn format_context(hits: &[Hit], max_chars: usize) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, h)| format!("[{}] ({} #{}): {}", i + 1, h.source, h.ordinal, preview(&h.text, max_chars)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// At most `max_chars` characters of `text`, with `…` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let kept = truncate_chars(text, max_chars);
    if kept.len() < text.len() { format!("{kept}…") } else { text.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(source: &str, ordinal: usize, text: &str) -> Hit { Hit { text: text.into(), source: source.into(), ordinal, score: 0.5, lexical: 0.0 } }

    #[test]
    fn context_blocks_are_numbered_and_cited() {
        let ctx = format_context(&[hit("a.pdf", 3, "alpha"), hit("notes/b.md", 0, "beta")], 1200);
        assert_eq!(ctx, "[1] (a.pdf #3): alpha\n\n[2] (notes/b.md #0): beta");
    }

    #[test]
    fn long_passages_are_truncated_with_ellipsis() {
        let long = "x".repeat(1300);
        let ctx = format_context(&[hit("a", 0, &long)], 1200);
        assert!(ctx.ends_with('…'));
        assert_eq!(ctx.chars().count(), "[1] (a #0): ".len() + 1200 + 1);
        let exact = "y".repeat(1200);
        assert!(!format_context(&[hit("a", 0, &exact)], 1200).ends_with('…'));
    }

    #[test]
    fn preview_cuts_on_char_boundaries() {
        let text = format!("{}é tail", "a".repeat(599));
        assert_eq!(preview(&text, 600), format!("{}é…", "a".repeat(599)));
        assert_eq!(preview("short", 600), "short");
    }
}
