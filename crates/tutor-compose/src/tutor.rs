use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::answer::{Answer, AnswerComposer};
use crate::quiz::{Quiz, QuizComposer, QuizOptions};
use tutor_core::config::Settings;
use tutor_core::data_processor::DataProcessor;
use tutor_core::retry::RetryPolicy;
use tutor_core::traits::{Completer, Embedder};
use tutor_core::types::{Difficulty, Hit};
use tutor_core::{Error, Result};
use tutor_index::{BuildReport, IndexBuilder, IndexHandle, LoadedSnapshot, Retriever};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexStep {
    Build,
    Reload,
}

impl fmt::Display for ReindexStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { ReindexStep::Build => "build", ReindexStep::Reload => "reload" })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("reindex {step} step failed: {source}")]
pub struct ReindexError {
    pub step: ReindexStep,
    #[source]
    pub source: Error,
}

/// Everything the presentation layer needs: ask, quiz, (re)build and reload.
pub struct Tutor {
    handle: Arc<IndexHandle>,
    retriever: Arc<Retriever>,
    builder: IndexBuilder,
    sources_dir: PathBuf,
    answers: AnswerComposer,
    quizzes: QuizComposer,
    enrich_by_default: bool,
}

impl Tutor {
    /// Wire HTTP backends (or the fake embedder) from configuration.
    pub fn from_settings(settings: &Settings, base_dir: &Path) -> Result<Self> {
        let retry = RetryPolicy::from(&settings.retry);
        let embedder = tutor_embed::get_default_embedder(&settings.embedding, retry)?;
        let completer = tutor_llm::get_default_completer(&settings.completion, retry)?;
        Ok(Self::with_backends(settings, base_dir, embedder, completer))
    }

    pub fn with_backends(settings: &Settings, base_dir: &Path, embedder: Arc<dyn Embedder>, completer: Arc<dyn Completer>) -> Self {
        let handle = Arc::new(IndexHandle::open(settings.index_dir(base_dir)));
        let retriever = Arc::new(Retriever::new(Arc::clone(&handle), Arc::clone(&embedder)).with_min_candidates(settings.retrieval.min_candidates));
        let builder = IndexBuilder::new(DataProcessor::new((&settings.chunking).into()), embedder, settings.embedding.batch_size);
        let c = &settings.completion;
        Self {
            answers: AnswerComposer::new(Arc::clone(&retriever), Arc::clone(&completer), &c.answer_model, settings.answer.clone()),
            quizzes: QuizComposer::new(Arc::clone(&retriever), completer, &c.quiz_model, &c.enrich_model, settings.quiz.clone()),
            handle,
            retriever,
            builder,
            sources_dir: settings.sources_dir(base_dir),
            enrich_by_default: settings.quiz.enrich,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.builder = self.builder.with_progress(progress);
        self
    }

    pub fn sources_dir(&self) -> &Path { &self.sources_dir }

    pub fn handle(&self) -> &Arc<IndexHandle> { &self.handle }

    pub async fn answer(&self, query: &str) -> Result<Answer> { self.answers.answer(query).await }

    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Hit>> { self.retriever.retrieve(query, k).await }

    /// Quiz with the configured enrichment default.
    pub async fn make_quiz(&self, topic: &str, n: usize, difficulty: Difficulty) -> Result<Quiz> {
        self.make_quiz_with(topic, &QuizOptions { n, difficulty, enrich: self.enrich_by_default }).await
    }

    pub async fn make_quiz_with(&self, topic: &str, opts: &QuizOptions) -> Result<Quiz> { self.quizzes.make_quiz(topic, opts).await }

    pub fn reload_index(&self, force: bool) -> Result<Arc<LoadedSnapshot>> { self.handle.ensure_loaded(force) }

    /// Rebuild from the configured sources directory.
    pub async fn build_index(&self) -> Result<BuildReport> { self.build_index_from(&self.sources_dir).await }

    pub async fn build_index_from(&self, sources_dir: &Path) -> Result<BuildReport> { self.builder.build(sources_dir, self.handle.store()).await }

    /// Build, then force a reload; the error names the step that failed.
    pub async fn reindex(&self) -> std::result::Result<BuildReport, ReindexError> {
        let report = self.build_index().await.map_err(|source| ReindexError { step: ReindexStep::Build, source })?;
        let loaded = self.reload_index(true).map_err(|source| ReindexError { step: ReindexStep::Reload, source })?;
        info!(generation = %loaded.manifest.generation, rows = loaded.snapshot.len(), "reindexed");
        Ok(report)
    }
}
