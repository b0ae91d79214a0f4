//! In-memory transport for unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::client::{Client, ClientError};
use crate::http::{ByteStream, Transport};
use crate::options::Config;
use crate::response::RawResponse;

/// Replays queued responses and records every request it sees.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<(u16, Value)>>,
    stream_body: Mutex<Option<&'static str>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub(crate) fn client(responses: Vec<(u16, Value)>) -> (Client, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(responses.into()),
            ..ScriptedTransport::default()
        });
        Self::wrap(transport)
    }

    pub(crate) fn client_with_stream(body: &'static str) -> (Client, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport {
            stream_body: Mutex::new(Some(body)),
            ..ScriptedTransport::default()
        });
        Self::wrap(transport)
    }

    fn wrap(transport: Arc<ScriptedTransport>) -> (Client, Arc<ScriptedTransport>) {
        let client = Client::with_transport(Config::new("test-key"), transport.clone())
            .expect("test config is valid");
        (client, transport)
    }

    pub(crate) fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().expect("lock").clone()
    }

    fn record(&self, path: &str, body: &Value) {
        self.requests
            .lock()
            .expect("lock")
            .push((path.to_string(), body.clone()));
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, path: &str, body: &Value) -> Result<RawResponse, ClientError> {
        self.record(path, body);
        let next = self.responses.lock().expect("lock").pop_front();
        match next {
            Some((status, value)) => Ok(RawResponse::new(status, value.to_string())),
            None => Err(ClientError::transport("no scripted response left", None)),
        }
    }

    async fn post_stream(&self, path: &str, body: &Value) -> Result<ByteStream, ClientError> {
        self.record(path, body);
        let text = self.stream_body.lock().expect("lock").take().unwrap_or_default();
        Ok(Box::pin(stream::iter(vec![Ok(Bytes::from_static(
            text.as_bytes(),
        ))])))
    }
}

/// Minimal chat completion body with the given assistant content.
pub(crate) fn chat_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1700000000,
        "model": "grok-2",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
    })
}
