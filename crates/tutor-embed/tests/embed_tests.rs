use async_trait::async_trait;
use std::sync::Mutex;

use pretty_assertions::assert_eq;
use tutor_core::config::EmbeddingSettings;
use tutor_core::retry::RetryPolicy;
use tutor_core::traits::Embedder;
use tutor_core::Error;
use tutor_embed::{dot, embed_all, embed_query, embeddings_body, get_default_embedder, normalize, parse_embeddings, FakeEmbedder};

/// Records batch sizes and returns unnormalized vectors.
struct RecordingEmbedder {
    batches: Mutex<Vec<usize>>,
    short_by: usize,
}

#[async_trait]
impl Embedder for RecordingEmbedder {
    fn embedder_id(&self) -> &str { "recording" }
    fn max_batch(&self) -> usize { 3 }
    async fn embed_batch(&self, texts: &[String]) -> tutor_core::Result<Vec<Vec<f32>>> {
        self.batches.lock().unwrap().push(texts.len());
        Ok(texts.iter().skip(self.short_by).map(|t| vec![t.len() as f32, 1.0]).collect())
    }
}

fn texts(n: usize) -> Vec<String> { (0..n).map(|i| format!("text number {i}")).collect() }

#[test]
fn normalize_produces_unit_vectors() {
    let mut v = vec![3.0, 4.0];
    normalize(&mut v);
    assert!((v[0] - 0.6).abs() < 1e-6 && (v[1] - 0.8).abs() < 1e-6);
    let mut zero = vec![0.0; 4];
    normalize(&mut zero);
    assert_eq!(zero, vec![0.0; 4]);
}

#[tokio::test]
async fn fake_embedder_is_deterministic_and_normalized() {
    let e = FakeEmbedder::new(64);
    let a = e.embed_batch(&["Plants need water".to_string()]).await.unwrap();
    let b = e.embed_batch(&["plants need water!".to_string()]).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a[0].len(), 64);
    assert!((dot(&a[0], &a[0]) - 1.0).abs() < 1e-5);
    assert_eq!(e.embedder_id(), "fake:xxh64:64");
}

#[tokio::test]
async fn fake_embedder_scores_shared_vocabulary_higher() {
    let e = FakeEmbedder::new(256);
    let q = e.embed_text("photosynthesis light energy");
    let near = e.embed_text("Photosynthesis turns light into chemical energy.");
    let far = e.embed_text("The French revolution began in 1789.");
    assert!(dot(&q, &near) > dot(&q, &far));
}

#[tokio::test]
async fn embed_all_respects_max_batch_and_normalizes() {
    let e = RecordingEmbedder { batches: Mutex::new(Vec::new()), short_by: 0 };
    let mut progress = 0;
    let vectors = embed_all(&e, &texts(7), 64, |n| progress += n).await.unwrap();
    assert_eq!(vectors.len(), 7);
    assert_eq!(progress, 7);
    assert_eq!(*e.batches.lock().unwrap(), vec![3, 3, 1]);
    for v in &vectors { assert!((dot(v, v) - 1.0).abs() < 1e-5); }
}

#[tokio::test]
async fn embed_all_rejects_short_batches() {
    let e = RecordingEmbedder { batches: Mutex::new(Vec::new()), short_by: 1 };
    let err = embed_all(&e, &texts(2), 2, |_| {}).await.unwrap_err();
    assert!(matches!(err, Error::EmbeddingService(_)));
}

#[tokio::test]
async fn embed_query_returns_one_vector() {
    let e = FakeEmbedder::new(32);
    let v = embed_query(&e, "cells").await.unwrap();
    assert_eq!(v.len(), 32);
}

#[test]
fn request_body_carries_model_and_inputs() {
    let body = embeddings_body("text-embedding-3-large", &["a".to_string(), "b".to_string()]);
    assert_eq!(body, serde_json::json!({"model": "text-embedding-3-large", "input": ["a", "b"]}));
}

#[test]
fn response_is_reordered_by_index() {
    let body = r#"{"object":"list","data":[
        {"object":"embedding","index":1,"embedding":[0.0,1.0]},
        {"object":"embedding","index":0,"embedding":[1.0,0.0]}
    ],"model":"m","usage":{"prompt_tokens":2,"total_tokens":2}}"#;
    let vectors = parse_embeddings(body, 2).unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[test]
fn response_with_missing_rows_is_an_error() {
    let body = r#"{"data":[{"index":0,"embedding":[1.0]}]}"#;
    assert!(matches!(parse_embeddings(body, 2), Err(Error::EmbeddingService(_))));
    assert!(matches!(parse_embeddings("not json", 1), Err(Error::EmbeddingService(_))));
}

#[test]
fn env_flag_selects_fake_embedder() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let e = get_default_embedder(&EmbeddingSettings::default(), RetryPolicy::single_shot()).unwrap();
    assert!(e.embedder_id().starts_with("fake:"));
    std::env::remove_var("APP_USE_FAKE_EMBEDDINGS");
}
