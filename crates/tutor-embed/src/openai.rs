use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use tutor_core::config::EmbeddingSettings;
use tutor_core::retry::{is_retryable_status, Failure, RetryPolicy};
use tutor_core::traits::Embedder;
use tutor_core::{Error, Result};

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
    batch_size: usize,
    retry: RetryPolicy,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(settings: &EmbeddingSettings, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::EmbeddingService(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/embeddings", settings.endpoint.trim_end_matches('/')),
            model: settings.model.clone(),
            api_key: settings.resolved_api_key(),
            batch_size: settings.batch_size.max(1),
            retry,
            id: format!("openai:{}", settings.model),
        })
    }

    async fn post_once(&self, body: &Value, expected: usize) -> std::result::Result<Vec<Vec<f32>>, Failure> {
        let mut req = self.client.post(&self.url).json(body);
        if let Some(key) = &self.api_key { req = req.bearer_auth(key); }
        let resp = req.send().await.map_err(|e| {
            let err = Error::EmbeddingService(format!("request failed: {e}"));
            if e.is_timeout() || e.is_connect() { Failure::transient(err) } else { Failure::permanent(err) }
        })?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| Failure::transient(Error::EmbeddingService(format!("reading response: {e}"))))?;
        if !status.is_success() {
            let err = Error::EmbeddingService(format!("HTTP {}: {}", status.as_u16(), snippet(&text)));
            return Err(if is_retryable_status(status.as_u16()) { Failure::transient(err) } else { Failure::permanent(err) });
        }
        parse_embeddings(&text, expected).map_err(Failure::permanent)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn max_batch(&self) -> usize { self.batch_size }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        debug!(model = %self.model, n = texts.len(), "requesting embeddings");
        let body = embeddings_body(&self.model, texts);
        let body = &body;
        self.retry.run("embeddings", move || self.post_once(body, texts.len())).await
    }
}

pub fn embeddings_body(model: &str, texts: &[String]) -> Value { json!({ "model": model, "input": texts }) }

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Decode an `/embeddings` response, restoring input order from `data[].index`.
pub fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let resp: EmbeddingResponse = serde_json::from_str(body).map_err(|e| Error::EmbeddingService(format!("malformed embeddings response: {e}")))?;
    let mut data = resp.data;
    data.sort_by_key(|d| d.index);
    if data.len() != expected || data.iter().enumerate().any(|(i, d)| d.index != i) {
        return Err(Error::EmbeddingService(format!("expected {expected} embeddings, got {}", data.len())));
    }
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

fn snippet(s: &str) -> String {
    let s = s.trim();
    if s.chars().count() > 300 { format!("{}…", s.chars().take(300).collect::<String>()) } else { s.to_string() }
}
