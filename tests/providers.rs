//! Embedding and generation clients against mocked HTTP services.

use repo_insights::config::{EmbeddingConfig, GenerationConfig};
use repo_insights::embedding::{embed_query, Embedder, OllamaEmbedder};
use repo_insights::error::InsightsError;
use repo_insights::generation::{ChatCompletionsClient, ChatMessage, Generator};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ollama_config(url: &str) -> EmbeddingConfig {
    EmbeddingConfig {
        provider: "ollama".to_string(),
        model: Some("nomic-embed-text".to_string()),
        dims: Some(3),
        url: Some(url.to_string()),
        ..Default::default()
    }
}

fn generation_config(url: &str) -> GenerationConfig {
    GenerationConfig {
        url: format!("{}/v1/chat/completions", url),
        model: "test-model".to_string(),
        timeout_secs: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ollama_embeds_batch_in_one_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "nomic-embed-text", "input": ["a", "b"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&ollama_config(&server.uri())).unwrap();
    let vectors = embedder
        .embed(&["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]);
    assert_eq!(embedder.dims(), 3);
}

#[tokio::test]
async fn test_ollama_error_is_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = OllamaEmbedder::new(&ollama_config(&server.uri())).unwrap();
    let err = embed_query(&embedder, "q").await.unwrap_err();
    assert!(matches!(err, InsightsError::Upstream { status: 404, .. }));
}

#[tokio::test]
async fn test_chat_completion_roundtrip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer hf-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "max_tokens": 400,
            "messages": [{ "role": "system", "content": "sys" }, { "role": "user", "content": "hi" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": "hello there" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::new(&generation_config(&server.uri()), "hf-test").unwrap();
    let answer = client
        .generate(&[ChatMessage::system("sys"), ChatMessage::user("hi")])
        .await
        .unwrap();
    assert_eq!(answer, "hello there");
}

#[tokio::test]
async fn test_chat_completion_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ChatCompletionsClient::new(&generation_config(&server.uri()), "k").unwrap();
    let err = client
        .generate(&[ChatMessage::user("hi")])
        .await
        .unwrap_err();
    match err {
        InsightsError::Upstream { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("expected Upstream, got {:?}", other),
    }
}
