use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use statecheck::config::OpenAiConfig;
use statecheck::dataset::PharmacyRecord;
use statecheck::provider::{Confidence, OpenAiAdapter, ValidationProvider};

fn adapter(server: &MockServer) -> OpenAiAdapter {
    OpenAiAdapter::new(
        &OpenAiConfig {
            api_key: "sk-test".to_string(),
            model: "o3-deep-research".to_string(),
            base_url: server.uri(),
        },
        4000,
    )
    .unwrap()
}

fn record() -> PharmacyRecord {
    PharmacyRecord {
        store_name: Some("Test Pharmacy".to_string()),
        address1: Some("123 Main St".to_string()),
        city: Some("Anytown".to_string()),
        state: Some("CA".to_string()),
        zip_code: Some("90210".to_string()),
        operates_in_states: Some("CA, NV, AZ".to_string()),
        ncpdp_id: Some("1234567".to_string()),
    }
}

#[tokio::test]
async fn well_formed_reply_parses_into_verdicts() {
    let server = MockServer::start().await;

    let reply = r#"Here are my findings:
{"validations": [{"pharmacy_index": 1, "is_correct": true, "confidence": "high", "reasoning": "matches state board records"}]}"#;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": reply } }]
        })))
        .mount(&server)
        .await;

    let outcome = adapter(&server).validate_batch(&[record()]).await;

    assert!(!outcome.is_fallback());
    let verdicts = outcome.verdicts();
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].record_index, 1);
    assert_eq!(verdicts[0].is_correct, Some(true));
    assert_eq!(verdicts[0].confidence, Confidence::High);
    assert!(verdicts[0].corrected_states.is_empty());
    assert_eq!(verdicts[0].reasoning, "matches state board records");
}

#[tokio::test]
async fn request_carries_role_tagged_messages_and_batch_listing() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "{\"validations\": []}" } }]
        })))
        .mount(&server)
        .await;

    adapter(&server).validate_batch(&[record()]).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();

    assert_eq!(body["model"], "o3-deep-research");
    assert_eq!(body["temperature"], 0.1);
    assert_eq!(body["max_completion_tokens"], 4000);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    let user_prompt = body["messages"][1]["content"].as_str().unwrap();
    assert!(user_prompt.contains("1. Pharmacy: Test Pharmacy"));
    assert!(user_prompt.contains("pharmacy_index"));
}

#[tokio::test]
async fn reply_without_json_falls_back_with_parse_reason() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": "I was unable to verify these pharmacies." } }]
        })))
        .mount(&server)
        .await;

    let outcome = adapter(&server).validate_batch(&[record()]).await;

    assert!(outcome.is_fallback());
    let verdicts = outcome.verdicts();
    assert_eq!(verdicts.len(), 1);
    assert_eq!(verdicts[0].record_index, 1);
    assert_eq!(verdicts[0].is_correct, None);
    assert_eq!(verdicts[0].confidence, Confidence::Error);
    assert!(verdicts[0].reasoning.contains("parse"));
}

#[tokio::test]
async fn backend_failure_falls_back_with_api_error_reason() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "The server had an error processing your request." }
        })))
        .mount(&server)
        .await;

    let records = vec![record(), record(), record()];
    let outcome = adapter(&server).validate_batch(&records).await;

    assert!(outcome.is_fallback());
    let verdicts = outcome.verdicts();
    assert_eq!(verdicts.len(), 3);
    let indices: Vec<i64> = verdicts.iter().map(|v| v.record_index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    for v in verdicts {
        assert_eq!(v.confidence, Confidence::Error);
        assert!(v.reasoning.contains("API error"));
        assert!(v.reasoning.contains("server had an error"));
    }
}

#[tokio::test]
async fn unreachable_backend_falls_back_instead_of_erroring() {
    // Port 1 refuses connections; validate_batch must still return a result.
    let adapter = OpenAiAdapter::new(
        &OpenAiConfig {
            api_key: "sk-test".to_string(),
            model: "o3-deep-research".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
        },
        4000,
    )
    .unwrap();

    let outcome = adapter.validate_batch(&[record(), record()]).await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.verdicts().len(), 2);
    assert!(outcome.verdicts()[0].reasoning.contains("API error"));
}
