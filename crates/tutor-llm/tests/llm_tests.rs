use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

use tutor_core::config::CompletionSettings;
use tutor_core::retry::RetryPolicy;
use tutor_core::types::{ChatMessage, CompletionRequest};
use tutor_core::Error;
use tutor_llm::{chat_body, get_default_completer, parse_chat};

#[test]
fn chat_body_plain() {
    let req = CompletionRequest::new("gpt-4o", vec![ChatMessage::system("be brief"), ChatMessage::user("hi")], 0.2);
    let body = chat_body(&req);
    assert_eq!(body["model"], json!("gpt-4o"));
    assert_eq!(body["messages"], json!([{"role": "system", "content": "be brief"}, {"role": "user", "content": "hi"}]));
    assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    assert!(body.get("response_format").is_none());
}

#[test]
fn chat_body_json_mode() {
    let req = CompletionRequest::new("gpt-4o-mini", vec![ChatMessage::user("quiz")], 0.3).with_timeout(Duration::from_secs(30)).json();
    assert_eq!(chat_body(&req)["response_format"], json!({"type": "json_object"}));
}

#[test]
fn parse_first_choice() {
    let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Plants need light (Intro.md #0)."},"finish_reason":"stop"}]}"#;
    assert_eq!(parse_chat(body).unwrap(), "Plants need light (Intro.md #0).");
}

#[test]
fn parse_null_content_and_failures() {
    assert_eq!(parse_chat(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap(), "");
    assert!(matches!(parse_chat(r#"{"choices":[]}"#), Err(Error::CompletionService(_))));
    assert!(matches!(parse_chat("<html>"), Err(Error::CompletionService(_))));
}

#[test]
fn completer_builds_without_network() {
    let settings = CompletionSettings { endpoint: "http://127.0.0.1:9/v1/".into(), ..CompletionSettings::default() };
    assert!(get_default_completer(&settings, RetryPolicy::single_shot()).is_ok());
}
