//! Chat-completion backends.

use std::sync::Arc;

use tutor_core::config::CompletionSettings;
use tutor_core::retry::RetryPolicy;
use tutor_core::traits::Completer;
use tutor_core::Result;

mod openai;

pub use openai::{chat_body, parse_chat, OpenAiCompleter};

pub fn get_default_completer(settings: &CompletionSettings, retry: RetryPolicy) -> Result<Arc<dyn Completer>> {
    Ok(Arc::new(OpenAiCompleter::new(settings, retry)?))
}
