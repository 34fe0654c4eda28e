//! Generation Provider Contract Tests
//!
//! These tests verify the exact HTTP format sent to the `generateContent`
//! endpoint, how response documents flow back through extraction, and how
//! error statuses map onto engine behavior (including retry sequencing).

use serde_json::{Value, json};
use toi::conversation::Turn;
use toi::extract::extract_reply_text;
use toi::orchestrator::{ReplyOrchestrator, ReplyOrigin};
use toi::persona::{FALLBACK_QUESTION, OVERLOADED_NOTICE};
use toi::provider::{CallError, GeminiBackend, GeminiConfig, GenerationBackend, GenerationRequest};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

fn question_body(text: &str) -> Value {
    json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
}

fn backend_for(server: &MockServer) -> GeminiBackend {
    GeminiBackend::new(GeminiConfig::new("test-key").with_base_url(server.uri()))
}

fn request_with(turns: Vec<Turn>) -> GenerationRequest {
    GenerationRequest {
        preamble: "前置き".to_owned(),
        turns,
        options: Default::default(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request Format Validation Tests
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_request_posts_to_the_model_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(header("content-type", "application/json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(question_body("その朝は、何が違いましたか？")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let request = request_with(vec![Turn::user("眠れなかった")]);
    let doc = backend.generate(&request).await.unwrap();

    assert_eq!(extract_reply_text(&doc), "その朝は、何が違いましたか？");
}

#[tokio::test]
async fn test_request_carries_preamble_history_and_roles() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user", "parts": [{"text": "前置き"}]},
                {"role": "user", "parts": [{"text": "昨日から眠れない"}]},
                {"role": "model", "parts": [{"text": "その夜は、何が始まりでしたか？"}]},
                {"role": "user", "parts": [{"text": "考えが止まらない"}]}
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(question_body("その考えは、誰の声ですか？")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let request = request_with(vec![
        Turn::user("昨日から眠れない"),
        Turn::assistant("その夜は、何が始まりでしたか？"),
        Turn::user("考えが止まらない"),
    ]);
    let result = backend.generate(&request).await;

    assert!(result.is_ok(), "request should match the mounted contract");
}

#[tokio::test]
async fn test_request_carries_generation_config() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(body_partial_json(json!({
            "generationConfig": {"maxOutputTokens": 256, "temperature": 0.7}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(question_body("その話は、いつからですか？")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let result = backend.generate(&request_with(vec![Turn::user("テスト")])).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_empty_preamble_is_omitted_from_contents() {
    let mock_server = MockServer::start().await;

    // With no preamble the user turn must be the first element.
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "こんにちは"}]}]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(question_body("どんな朝でしたか？")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let request = GenerationRequest {
        preamble: String::new(),
        turns: vec![Turn::user("こんにちは")],
        options: Default::default(),
    };
    let result = backend.generate(&request).await;

    assert!(result.is_ok());
}

// ────────────────────────────────────────────────────────────────────────────
// Error Response Tests
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_error_503_maps_to_overloaded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": 503, "status": "UNAVAILABLE"}
        })))
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let err = backend
        .generate(&request_with(vec![Turn::user("テスト")]))
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Overloaded));
}

#[tokio::test]
async fn test_error_400_keeps_status_and_detail() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "API key not valid"}
        })))
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let err = backend
        .generate(&request_with(vec![Turn::user("テスト")]))
        .await
        .unwrap_err();

    match err {
        CallError::Status { code, detail } => {
            assert_eq!(code, 400);
            assert!(detail.contains("API key not valid"));
        }
        other => panic!("expected Status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_429_is_not_treated_as_overloaded() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"status": "RESOURCE_EXHAUSTED"}
        })))
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let err = backend
        .generate(&request_with(vec![Turn::user("テスト")]))
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::Status { code: 429, .. }));
}

#[tokio::test]
async fn test_non_json_success_body_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let backend = backend_for(&mock_server);
    let err = backend
        .generate(&request_with(vec![Turn::user("テスト")]))
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::MalformedBody(_)));
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestrated Retry Sequencing Tests
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_orchestrator_accepts_a_valid_first_reply() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(question_body("その予定は、誰が決めたものですか？")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = ReplyOrchestrator::new(backend_for(&mock_server));
    let reply = orchestrator.reply(&[Turn::user("予定が多すぎる")]).await;

    assert_eq!(reply.text, "その予定は、誰が決めたものですか？");
    assert_eq!(reply.origin, ReplyOrigin::Generated { attempts: 1 });
}

#[tokio::test]
async fn test_orchestrator_retries_contract_failures_then_falls_back() {
    let mock_server = MockServer::start().await;

    // A statement with no question terminator fails the contract every time.
    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(question_body("なるほど、それは大変でしたね。")),
        )
        .expect(3)
        .mount(&mock_server)
        .await;

    let orchestrator = ReplyOrchestrator::new(backend_for(&mock_server));
    let reply = orchestrator.reply(&[Turn::user("疲れました")]).await;

    assert_eq!(reply.text, FALLBACK_QUESTION);
    assert_eq!(reply.origin, ReplyOrigin::Fallback);
}

#[tokio::test]
async fn test_orchestrator_stops_immediately_on_overload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = ReplyOrchestrator::new(backend_for(&mock_server));
    let reply = orchestrator.reply(&[Turn::user("テスト")]).await;

    assert_eq!(reply.text, OVERLOADED_NOTICE);
    assert_eq!(reply.origin, ReplyOrigin::Overloaded);
}
