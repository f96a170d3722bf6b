//! Domain types shared by the indexing, retrieval and composition crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A bounded span of a source document; the unit of embedding and retrieval.
///
/// - `source`: path of the document relative to the sources directory
/// - `ordinal`: position within the parent document, starting at 0
/// - `text`: the chunk payload
///
/// `(source, ordinal)` is unique within a snapshot; `ordinal` alone is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source: String,
    #[serde(rename = "chunk")]
    pub ordinal: usize,
    pub text: String,
}

/// One retrieved passage.
///
/// `score` is the cosine similarity to the query (higher is better);
/// `lexical` is the token-set overlap ratio in `0..=100` used to rerank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub text: String,
    pub source: String,
    #[serde(rename = "chunk")]
    pub ordinal: usize,
    pub score: f32,
    pub lexical: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self { Self { role: Role::System, content: content.into() } }
    pub fn user(content: impl Into<String>) -> Self { Self { role: Role::User, content: content.into() } }
}

/// A single chat-completion call.
///
/// `json_object` asks the backend for a structured (JSON object) response.
/// `timeout` overrides the client-wide timeout for this call only.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub timeout: Option<Duration>,
    pub json_object: bool,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, temperature: f32) -> Self {
        Self { model: model.into(), messages, temperature, timeout: None, json_object: false }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn json(mut self) -> Self {
        self.json_object = true;
        self
    }
}

/// Requested quiz difficulty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self { Difficulty::Easy => "easy", Difficulty::Medium => "medium", Difficulty::Hard => "hard" };
        f.write_str(s)
    }
}

impl FromStr for Difficulty {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(crate::Error::InvalidConfig(format!("unknown difficulty '{other}'"))),
        }
    }
}
