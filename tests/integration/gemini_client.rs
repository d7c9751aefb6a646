//! Gemini adapter against a wiremock server

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use keypool::{GeminiClient, ProviderClient, ProviderError};

use crate::common::constants::*;
use crate::mocks::{mock_generate_empty, mock_generate_error, mock_generate_quota};

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::with_base_url(reqwest::Client::new(), &server.uri())
}

#[tokio::test]
async fn test_sends_prompt_and_key_and_joins_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/models/{}:generateContent", MODEL_A)))
        .and(header("x-goog-api-key", SECRET_1))
        .and(body_json(json!({"contents": [{"parts": [{"text": PROMPT}]}]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [{"text": "Sockets wait, "}, {"text": "idle and warm"}]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let text = client(&server)
        .generate(SECRET_1, MODEL_A, PROMPT)
        .await
        .unwrap();
    assert_eq!(text, "Sockets wait, idle and warm");
}

#[tokio::test]
async fn test_quota_error_is_classified() {
    let server = MockServer::start().await;
    mock_generate_quota(&server, MODEL_A).await;

    let err = client(&server)
        .generate(SECRET_1, MODEL_A, PROMPT)
        .await
        .unwrap_err();
    assert_eq!(err.http_status(), Some(429));
    assert!(err.is_quota());
    assert!(err.to_string().contains("Resource has been exhausted"));
}

#[tokio::test]
async fn test_quota_wording_without_429() {
    let server = MockServer::start().await;
    mock_generate_error(&server, MODEL_A, 400, "Quota exceeded for quota metric").await;

    let err = client(&server)
        .generate(SECRET_1, MODEL_A, PROMPT)
        .await
        .unwrap_err();
    assert!(err.is_quota());
    assert!(!err.is_credential_rejected());
}

#[tokio::test]
async fn test_invalid_key_is_rejection() {
    let server = MockServer::start().await;
    mock_generate_error(&server, MODEL_A, 403, "API key not valid. Please pass a valid API key.")
        .await;

    let err = client(&server)
        .generate(SECRET_1, MODEL_A, PROMPT)
        .await
        .unwrap_err();
    assert!(err.is_credential_rejected());
    assert!(!err.is_quota());
}

#[tokio::test]
async fn test_non_json_error_body_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/models/{}:generateContent", MODEL_A)))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate(SECRET_1, MODEL_A, PROMPT)
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::http(502, "bad gateway"));
}

#[tokio::test]
async fn test_empty_candidates_is_invalid_response() {
    let server = MockServer::start().await;
    mock_generate_empty(&server, MODEL_A).await;

    let err = client(&server)
        .generate(SECRET_1, MODEL_A, PROMPT)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let client = GeminiClient::with_base_url(reqwest::Client::new(), "http://127.0.0.1:1");
    let err = client.generate(SECRET_1, MODEL_A, PROMPT).await.unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
    assert_eq!(err.http_status(), None);
}

#[tokio::test]
async fn test_path_traversal_model_is_refused_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hit"))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .generate(SECRET_1, "../../files?x=", PROMPT)
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::InvalidModel("../../files?x=".to_string()));
    assert!(server.received_requests().await.unwrap().is_empty());
}
