use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

/// Layered configuration: built-in defaults, `config.toml`,
/// `config.<env>.toml`, then `APP_*` environment variables (`__` nests, so
/// `APP_DATA__INDEX_DIR` sets `data.index_dir`).
pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the current directory using `RUST_ENV` (default `dev`).
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let base_dir = env::current_dir()?;
        Self::load_from(&base_dir, &env_name)
    }

    pub fn load_from(base_dir: &Path, env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(base_dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: base_dir.to_path_buf() };
        config.settings()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    pub fn base_dir(&self) -> &Path { &self.base_dir }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub completion: CompletionSettings,
    pub chunking: ChunkingSettings,
    pub retrieval: RetrievalSettings,
    pub answer: AnswerSettings,
    pub quiz: QuizSettings,
    pub retry: RetrySettings,
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.embedding.batch_size == 0 { return Err(Error::InvalidConfig("embedding.batch_size must be > 0".into())); }
        if self.chunking.max_tokens == 0 { return Err(Error::InvalidConfig("chunking.max_tokens must be > 0".into())); }
        if self.chunking.max_chunk_chars == 0 { return Err(Error::InvalidConfig("chunking.max_chunk_chars must be > 0".into())); }
        if self.answer.k == 0 || self.quiz.k == 0 { return Err(Error::InvalidConfig("retrieval k must be > 0".into())); }
        Ok(())
    }

    pub fn sources_dir(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.data.sources_dir) }

    pub fn index_dir(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.data.index_dir) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    pub sources_dir: String,
    pub index_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self { Self { sources_dir: "data/sources".into(), index_dir: "data/simple".into() } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".into(),
            model: "text-embedding-3-large".into(),
            api_key: None,
            batch_size: 64,
            timeout_secs: 60,
        }
    }
}

impl EmbeddingSettings {
    pub fn resolved_api_key(&self) -> Option<String> { resolve_api_key(self.api_key.as_deref()) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub answer_model: String,
    pub quiz_model: String,
    pub enrich_model: String,
    pub timeout_secs: u64,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".into(),
            api_key: None,
            answer_model: "gpt-4o".into(),
            quiz_model: "gpt-4o-mini".into(),
            enrich_model: "gpt-4o".into(),
            timeout_secs: 120,
        }
    }
}

impl CompletionSettings {
    pub fn resolved_api_key(&self) -> Option<String> { resolve_api_key(self.api_key.as_deref()) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub max_chunk_chars: usize,
    pub max_document_chars: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        let c = ChunkingConfig::default();
        Self { max_tokens: c.max_tokens, overlap_tokens: c.overlap_tokens, max_chunk_chars: c.max_chunk_chars, max_document_chars: c.max_document_chars }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(s: &ChunkingSettings) -> Self {
        ChunkingConfig { max_tokens: s.max_tokens, overlap_tokens: s.overlap_tokens, max_chunk_chars: s.max_chunk_chars, max_document_chars: s.max_document_chars }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Floor on the candidate pool handed to the reranker.
    pub min_candidates: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { min_candidates: 4 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSettings {
    pub k: usize,
    pub hit_chars: usize,
    pub temperature: f32,
}

impl Default for AnswerSettings {
    fn default() -> Self { Self { k: 8, hit_chars: 1200, temperature: 0.2 } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSettings {
    pub k: usize,
    pub context_chars: usize,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub enrich: bool,
    pub min_explanation_words: usize,
}

impl Default for QuizSettings {
    fn default() -> Self { Self { k: 8, context_chars: 2500, temperature: 0.3, timeout_secs: 30, enrich: false, min_explanation_words: 110 } }
}

/// `max_retries = 0` keeps backend calls single-shot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self { Self { max_retries: 0, base_delay_ms: 500 } }
}

fn resolve_api_key(explicit: Option<&str>) -> Option<String> {
    explicit
        .filter(|k| !k.trim().is_empty())
        .map(str::to_string)
        .or_else(|| env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()))
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
