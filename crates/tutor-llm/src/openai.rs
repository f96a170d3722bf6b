use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use tutor_core::config::CompletionSettings;
use tutor_core::retry::{is_retryable_status, Failure, RetryPolicy};
use tutor_core::traits::Completer;
use tutor_core::types::CompletionRequest;
use tutor_core::{Error, Result};

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompleter {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    retry: RetryPolicy,
}

impl OpenAiCompleter {
    pub fn new(settings: &CompletionSettings, retry: RetryPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::CompletionService(format!("http client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", settings.endpoint.trim_end_matches('/')),
            api_key: settings.resolved_api_key(),
            retry,
        })
    }

    async fn post_once(&self, body: &Value, timeout: Option<Duration>) -> std::result::Result<String, Failure> {
        let mut req = self.client.post(&self.url).json(body);
        if let Some(key) = &self.api_key { req = req.bearer_auth(key); }
        if let Some(t) = timeout { req = req.timeout(t); }
        let resp = req.send().await.map_err(|e| {
            let err = Error::CompletionService(if e.is_timeout() { format!("timed out: {e}") } else { format!("request failed: {e}") });
            if e.is_timeout() || e.is_connect() { Failure::transient(err) } else { Failure::permanent(err) }
        })?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| Failure::transient(Error::CompletionService(format!("reading response: {e}"))))?;
        if !status.is_success() {
            let err = Error::CompletionService(format!("HTTP {}: {}", status.as_u16(), text.trim().chars().take(300).collect::<String>()));
            return Err(if is_retryable_status(status.as_u16()) { Failure::transient(err) } else { Failure::permanent(err) });
        }
        parse_chat(&text).map_err(Failure::permanent)
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(model = %request.model, messages = request.messages.len(), json = request.json_object, "chat completion");
        let body = chat_body(request);
        let body = &body;
        self.retry.run("chat.completions", move || self.post_once(body, request.timeout)).await
    }
}

/// JSON body for a chat-completion request.
pub fn chat_body(request: &CompletionRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages,
        "temperature": request.temperature,
    });
    if request.json_object { body["response_format"] = json!({ "type": "json_object" }); }
    body
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Text of the first choice. A null `content` reads as an empty reply.
pub fn parse_chat(body: &str) -> Result<String> {
    let resp: ChatResponse = serde_json::from_str(body).map_err(|e| Error::CompletionService(format!("malformed completion response: {e}")))?;
    let first = resp.choices.into_iter().next().ok_or_else(|| Error::CompletionService("completion returned no choices".into()))?;
    Ok(first.message.content.unwrap_or_default())
}
