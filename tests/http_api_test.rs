//! End-to-end tests against a mock HTTP server.

use chatwire::options::{Config, ParameterSet};
use chatwire::{Client, ClientError, Message, ModelDescriptor};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_completion_response(content: &str) -> Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1677652288,
        "model": "grok-2",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21},
        "system_fingerprint": "fp_44709d6fcb"
    })
}

fn client_for(server: &MockServer) -> Client {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("chatwire=debug")
        .with_test_writer()
        .try_init();

    let config = Config::new("test-api-key")
        .with_base_url(server.uri())
        .with_retry_delay(Duration::from_millis(10))
        .with_debug(true);
    Client::new(config).unwrap()
}

#[tokio::test]
async fn test_chat_completion_sends_auth_and_parses_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({
            "model": "grok-2",
            "messages": [{"role": "user", "content": "Hello"}],
            "temperature": 0.7,
            "max_tokens": 150
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_response("Hi!")))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server).chat().generate("Hello").await.unwrap();
    assert_eq!(reply.content().as_deref(), Some("Hi!"));
    assert_eq!(reply.usage().total_tokens, 21);
    assert_eq!(reply.system_fingerprint(), Some("fp_44709d6fcb"));
}

#[tokio::test]
async fn test_rate_limit_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "Rate limit reached", "type": "rate_limit_error"}
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_response("after retry")))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server).chat().generate("Hello").await.unwrap();
    assert_eq!(reply.content().as_deref(), Some("after retry"));
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("x-request-id", "req-42")
                .set_body_json(json!({
                    "error": {
                        "message": "Incorrect API key provided",
                        "type": "invalid_request_error",
                        "param": null,
                        "code": "invalid_api_key"
                    }
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).chat().generate("Hello").await.unwrap_err();
    match &err {
        ClientError::Api { message, details } => {
            assert_eq!(message, "Incorrect API key provided");
            assert_eq!(details.code, Some(401));
            assert_eq!(details.kind.as_deref(), Some("invalid_request_error"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.request_id(), Some("req-42"));
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .completions()
        .create("Once upon a time")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport { .. }));
    assert_eq!(err.status(), Some(503));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_success_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).chat().generate("Hello").await.unwrap_err();
    assert!(matches!(err, ClientError::Parse { .. }));
    assert_eq!(err.status(), Some(200));
}

#[tokio::test]
async fn test_streaming_chat_delivers_chunks_in_order() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"Hello\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world\"},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n"
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let mut seen = Vec::new();
    let summary = client_for(&server)
        .chat()
        .stream_chat("Say hello", |chunk| {
            seen.push(chunk.stream_content().unwrap_or_default().to_string())
        })
        .await
        .unwrap();

    assert_eq!(seen, vec!["Hello", " world"]);
    assert_eq!(summary.chunks, 2);
    assert_eq!(summary.content, "Hello world");
}

#[tokio::test]
async fn test_streaming_error_status_surfaces_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "stream not allowed"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut calls = 0;
    let err = client_for(&server)
        .chat()
        .stream_chat("x", |_| calls += 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Api { .. }));
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn test_stalled_stream_hits_read_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("data: [DONE]\n\n", "text/event-stream")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = Config::new("test-api-key")
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(300));
    let client = Client::new(config).unwrap();

    let started = Instant::now();
    let mut calls = 0;
    let err = client
        .chat()
        .stream_chat("Hello", |_| calls += 1)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Transport { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(calls, 0);
}

#[tokio::test]
async fn test_session_history_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{"role": "user", "content": "My name is Alice."}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_response("Nice to meet you, Alice.")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "user", "content": "My name is Alice."},
                {"role": "assistant", "content": "Nice to meet you, Alice."},
                {"role": "user", "content": "What is my name?"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_response("Alice.")))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = client_for(&server).begin_conversation();
    session.send("My name is Alice.").await.unwrap();
    let reply = session.send("What is my name?").await.unwrap();

    assert_eq!(reply.content().as_deref(), Some("Alice."));
    assert_eq!(
        session.into_history(),
        vec![
            Message::user("My name is Alice."),
            Message::assistant("Nice to meet you, Alice."),
            Message::user("What is my name?"),
            Message::assistant("Alice."),
        ]
    );
}

#[tokio::test]
async fn test_image_analysis_and_embeddings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "grok-2-vision"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "img",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": [
                        {"type": "text", "text": "A lighthouse"},
                        {"type": "text", "text": "at dusk."}
                    ]
                },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(body_partial_json(json!({"model": "v1", "input": "lighthouse", "dimensions": 3})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{"object": "embedding", "index": 0, "embedding": [0.1, 0.2, 0.3]}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let analysis = client
        .images()
        .analyze("https://example.com/lighthouse.webp", Some("What is shown?"))
        .await
        .unwrap();
    assert_eq!(analysis.analysis(), "A lighthouse at dusk.");

    let params = ParameterSet::new().with_dimensions(3).unwrap();
    let embeddings = client
        .embeddings()
        .create_with_options("lighthouse", &params)
        .await
        .unwrap();
    assert_eq!(embeddings.vectors(), vec![&[0.1f32, 0.2, 0.3][..]]);
}

#[tokio::test]
async fn test_default_model_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "grok-3-mini"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion_response("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_model(ModelDescriptor::Grok3Mini);
    assert!(client.chat().generate("ping").await.is_ok());
}
