//! 端到端测试：假传输注入
//!
//! 用捕获式假传输把翻译结果固定下来检查，网络零参与。

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, stream};
use http::header::AUTHORIZATION;
use oai_adapter::{
    AdapterClient, AdapterConfig, AdapterError, AtomicConfig, ByteStream, ResponsesOutcome,
    TranslatedRequest, Transport,
};
use serde_json::{Map, Value, json};

/// 一次出站调用的快照
#[derive(Debug, Clone)]
struct CapturedRequest {
    path: String,
    authorization: String,
    body: Value,
    is_stream: bool,
}

/// 记录翻译结果并回放预置响应的假传输
struct FakeTransport {
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    response: Value,
    stream_chunks: Vec<Result<Bytes, AdapterError>>,
}

impl FakeTransport {
    fn new(response: Value) -> (Self, Arc<Mutex<Vec<CapturedRequest>>>) {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let transport = Self {
            captured: Arc::clone(&captured),
            response,
            stream_chunks: Vec::new(),
        };
        (transport, captured)
    }

    fn streaming(chunks: Vec<Bytes>) -> (Self, Arc<Mutex<Vec<CapturedRequest>>>) {
        let (mut transport, captured) = Self::new(Value::Null);
        transport.stream_chunks = chunks.into_iter().map(Ok).collect();
        (transport, captured)
    }

    fn capture(&self, request: &TranslatedRequest) {
        self.captured.lock().unwrap().push(CapturedRequest {
            path: request.path.clone(),
            authorization: request
                .headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            body: Value::Object(request.body.clone()),
            is_stream: request.is_stream,
        });
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &TranslatedRequest) -> Result<Value, AdapterError> {
        self.capture(request);
        Ok(self.response.clone())
    }

    async fn open_stream(&self, request: &TranslatedRequest) -> Result<ByteStream, AdapterError> {
        self.capture(request);
        let chunks: Vec<Result<Bytes, AdapterError>> = self
            .stream_chunks
            .iter()
            .map(|chunk| match chunk {
                Ok(bytes) => Ok(bytes.clone()),
                Err(_) => Err(AdapterError::transport("fake transport error")),
            })
            .collect();
        Ok(stream::iter(chunks).boxed())
    }
}

fn config_from(extra: &[(&str, &str)]) -> Arc<AtomicConfig> {
    let extra: Vec<(String, String)> = extra
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let config = AdapterConfig::resolve(|name| {
        for (k, v) in &extra {
            if k == name {
                return Some(v.clone());
            }
        }
        match name {
            "OPENAI_BASE_URL" => Some("https://mock.local".to_string()),
            "OPENAI_TOKEN" => Some("TEST_TOKEN".to_string()),
            _ => None,
        }
    })
    .expect("test config must resolve");
    Arc::new(AtomicConfig::new(config))
}

#[tokio::test]
async fn sync_call_translates_and_normalizes() {
    let config = config_from(&[
        ("OPENAI_BASIC_PATH_MAP", r#"{"/responses": "/v1/resp"}"#),
        (
            "OPENAI_BASIC_PARAM_MAP",
            r#"{"max_tokens": "max_output_tokens"}"#,
        ),
    ]);
    let (transport, captured) = FakeTransport::new(json!({
        "id": "resp-1",
        "result": {"text": "hello back"},
        "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3}
    }));
    let client = AdapterClient::with_transport(config, transport);

    let mut opts = Map::new();
    opts.insert("max_tokens".to_string(), json!(50));
    opts.insert("logprobs".to_string(), json!(2));

    let outcome = client
        .responses_create("gpt-4o-mini", json!("hello"), opts, false)
        .await
        .unwrap();

    let ResponsesOutcome::Complete(response) = outcome else {
        panic!("expected a materialized response");
    };
    assert_eq!(response.get("output_text"), Some(&json!("hello back")));
    assert_eq!(response.get("id"), Some(&json!("resp-1")));

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].path, "/v1/resp");
    assert_eq!(captured[0].authorization, "Basic TEST_TOKEN");
    assert!(!captured[0].is_stream);
    // 重命名生效，logprobs 被默认 DropSet 丢弃
    assert_eq!(
        captured[0].body.get("max_output_tokens"),
        Some(&json!(50))
    );
    assert!(captured[0].body.get("max_tokens").is_none());
    assert!(captured[0].body.get("logprobs").is_none());
    assert_eq!(captured[0].body.get("input"), Some(&json!("hello")));
}

#[tokio::test]
async fn extra_allow_survives_allowlist() {
    let config = config_from(&[]);
    let (transport, captured) = FakeTransport::new(json!({"text": "ok"}));
    let client = AdapterClient::with_transport(config, transport);

    let mut opts = Map::new();
    opts.insert("safety_profile".to_string(), json!("strict"));
    opts.insert("totally_unknown".to_string(), json!(true));

    client
        .responses_create("m", json!("hi"), opts, false)
        .await
        .unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured[0].body.get("safety_profile"), Some(&json!("strict")));
    assert!(captured[0].body.get("totally_unknown").is_none());
}

#[tokio::test]
async fn bearer_auth_header_cannot_be_overridden() {
    let config = config_from(&[
        ("OPENAI_AUTH_TYPE", "bearer"),
        (
            "OPENAI_BASIC_HEADERS",
            r#"{"Authorization": "Basic sneaky", "X-Team": "infra"}"#,
        ),
    ]);
    let (transport, captured) = FakeTransport::new(json!({"text": "ok"}));
    let client = AdapterClient::with_transport(config, transport);

    client
        .responses_create("m", json!("hi"), Map::new(), false)
        .await
        .unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured[0].authorization, "Bearer TEST_TOKEN");
}

#[tokio::test]
async fn model_route_redirects_matching_models() {
    let config = config_from(&[
        ("OPENAI_BASIC_PATH_MAP", r#"{"/responses": "/v1/resp"}"#),
        (
            "OPENAI_BASIC_MODEL_ROUTES",
            r#"{"llama3*": {"path": "/api/generate_llama"}}"#,
        ),
    ]);
    let (transport, captured) = FakeTransport::new(json!({"text": "ok"}));
    let client = AdapterClient::with_transport(config, transport);

    client
        .responses_create("llama3.1", json!("hi"), Map::new(), false)
        .await
        .unwrap();
    client
        .responses_create("gpt-4", json!("hi"), Map::new(), false)
        .await
        .unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured[0].path, "/api/generate_llama");
    assert_eq!(captured[1].path, "/v1/resp");
}

#[tokio::test]
async fn disable_streaming_yields_materialized_response() {
    let config = config_from(&[("OPENAI_BASIC_DISABLE_STREAMING", "1")]);
    let (transport, captured) = FakeTransport::new(json!({"text": "sync instead"}));
    let client = AdapterClient::with_transport(config, transport);

    let outcome = client
        .responses_create("m", json!("hi"), Map::new(), true)
        .await
        .unwrap();

    let ResponsesOutcome::Complete(response) = outcome else {
        panic!("streaming must be downgraded to a materialized response");
    };
    assert_eq!(response.get("output_text"), Some(&json!("sync instead")));
    assert!(!captured.lock().unwrap()[0].is_stream);
}

#[tokio::test]
async fn clean_stream_completes_after_end_marker() {
    let config = config_from(&[]);
    let body = concat!(
        "data: {\"type\": \"delta\", \"text\": \"Hel\"}\n\n",
        "data: {\"type\": \"delta\", \"text\": \"lo\"}\n\n",
        "data: {\"type\": \"done\"}\n\n",
    );
    let (transport, captured) = FakeTransport::streaming(vec![Bytes::from(body)]);
    let client = AdapterClient::with_transport(config, transport);

    let outcome = client
        .responses_create("m", json!("hi"), Map::new(), true)
        .await
        .unwrap();
    let ResponsesOutcome::Stream(events) = outcome else {
        panic!("expected an event stream");
    };
    assert!(captured.lock().unwrap()[0].is_stream);

    let events: Vec<Value> = events.map(|e| e.unwrap()).collect().await;
    assert_eq!(
        events,
        vec![
            json!({"type": "response.delta", "delta": {"output_text": "Hel"}}),
            json!({"type": "response.delta", "delta": {"output_text": "lo"}}),
            json!({"type": "response.completed"}),
        ]
    );
}

#[tokio::test]
async fn truncated_stream_is_a_distinct_failure() {
    let config = config_from(&[]);
    let body = "data: {\"type\": \"delta\", \"text\": \"partial\"}\n\n";
    let (transport, _captured) = FakeTransport::streaming(vec![Bytes::from(body)]);
    let client = AdapterClient::with_transport(config, transport);

    let outcome = client
        .responses_create("m", json!("hi"), Map::new(), true)
        .await
        .unwrap();
    let ResponsesOutcome::Stream(events) = outcome else {
        panic!("expected an event stream");
    };

    let mut events: Vec<Result<Value, AdapterError>> = events.collect().await;
    let last = events.pop().unwrap();
    assert!(matches!(last, Err(AdapterError::StreamTruncated)));
    assert!(events.iter().all(Result::is_ok));
}

#[tokio::test]
async fn chat_messages_flattened_into_prompt() {
    let config = config_from(&[(
        "OPENAI_BASIC_PATH_MAP",
        r#"{"/chat/completions": "/v1/chat"}"#,
    )]);
    let (transport, captured) = FakeTransport::new(json!({"text": "ok"}));
    let client = AdapterClient::with_transport(config, transport);

    let messages = vec![
        json!({"role": "system", "content": "be brief"}),
        json!({"role": "user", "content": "hi"}),
    ];
    client
        .chat_create("m", &messages, Map::new(), false)
        .await
        .unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured[0].path, "/v1/chat");
    assert_eq!(
        captured[0].body.get("input"),
        Some(&json!("SYSTEM: be brief\nUSER: hi\nASSISTANT:"))
    );
}

#[tokio::test]
async fn stream_key_in_opts_is_stripped() {
    let config = config_from(&[]);
    let (transport, captured) = FakeTransport::new(json!({"text": "ok"}));
    let client = AdapterClient::with_transport(config, transport);

    let mut opts = Map::new();
    opts.insert("stream".to_string(), json!(true));

    let outcome = client
        .responses_create("m", json!("hi"), opts, false)
        .await
        .unwrap();

    assert!(matches!(outcome, ResponsesOutcome::Complete(_)));
    assert!(captured.lock().unwrap()[0].body.get("stream").is_none());
}

#[test]
fn placeholder_token_fails_before_any_network_call() {
    let err = AdapterConfig::resolve(|name| match name {
        "OPENAI_BASE_URL" => Some("https://mock.local".to_string()),
        "OPENAI_TOKEN" => Some("REPLACE_ME".to_string()),
        _ => None,
    })
    .unwrap_err();
    assert!(matches!(err, AdapterError::Config(_)));
    assert!(err.to_string().contains("placeholder"));
}
