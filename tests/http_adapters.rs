//! Wire-level tests for the HTTP adapters against a stub server

use std::collections::HashMap;

use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scam_lens::config::CaseIndexSettings;
use scam_lens::domain::{CaseIndex, LlmProvider, LlmRequest};
use scam_lens::infrastructure::case_index::HttpCaseIndex;
use scam_lens::infrastructure::llm::{HttpClient, OpenAiProvider};

fn index_settings(server: &MockServer) -> CaseIndexSettings {
    CaseIndexSettings {
        embedding_url: format!("{}/embed", server.uri()),
        index_url: server.uri(),
        collection: "fraud_cases".to_string(),
        top_k: 5,
    }
}

#[tokio::test]
async fn case_index_embed_and_search_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .and(body_partial_json(serde_json::json!({"text": "사기 문자"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "vector": [0.11, 0.22, 0.33]
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/collections/fraud_cases/points/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [
                    { "id": 12, "score": 0.87, "payload": { "CONTENT": "사칭 전화" } },
                    { "id": "a6b0c9", "score": 0.41, "payload": {} }
                ]
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let index = HttpCaseIndex::new(HttpClient::new(), &index_settings(&server));

    let vector = index.embed("사기 문자").await.unwrap();
    assert_eq!(vector, vec![0.11, 0.22, 0.33]);

    let results = index.search(&vector, 5).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "12");
    assert!((results[0].score - 0.87).abs() < 1e-6);
    assert_eq!(results[0].payload_str("CONTENT"), Some("사칭 전화"));
    assert_eq!(results[1].id, "a6b0c9");
}

#[tokio::test]
async fn case_index_upsert_puts_point() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/collections/fraud_cases/points"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "result": { "status": "acknowledged" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let index = HttpCaseIndex::new(HttpClient::new(), &index_settings(&server));

    let mut payload = HashMap::new();
    payload.insert("source".to_string(), serde_json::json!("user-analyzed"));

    index
        .upsert("3f6f0c", &[0.1, 0.2, 0.3], payload)
        .await
        .unwrap();
}

#[tokio::test]
async fn case_index_surfaces_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let index = HttpCaseIndex::new(HttpClient::new(), &index_settings(&server));

    let error = index.embed("사기 문자").await.unwrap_err();
    assert!(error.to_string().contains("503"));
}

#[tokio::test]
async fn openai_provider_chat_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(
            serde_json::json!({ "model": "gpt-4o-mini" }),
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-9",
                "model": "gpt-4o-mini",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "{\"classification\": \"VALID_CASE\", \"reason\": \"ok\", \"confidence\": 0.9}"
                    },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150 }
            })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url(HttpClient::new(), "sk-test", server.uri());

    let request = LlmRequest::builder()
        .user("이 문자 사기인가요?")
        .temperature(0.1)
        .max_tokens(500)
        .build();
    let response = provider.chat("gpt-4o-mini", request).await.unwrap();

    assert!(response.content().contains("VALID_CASE"));
    assert_eq!(response.usage.unwrap().total_tokens, 150);
}

#[tokio::test]
async fn openai_provider_surfaces_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::with_base_url(HttpClient::new(), "sk-test", server.uri());

    let error = provider
        .chat("gpt-4o-mini", LlmRequest::builder().user("hi").build())
        .await
        .unwrap_err();

    assert!(error.to_string().contains("429"));
}
